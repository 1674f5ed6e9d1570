//! Named fire-and-forget tasks
//!
//! Work that must not hold up a response (persisting a streamed reply after
//! the caller already has it) runs here. Failures are logged, never returned.

use std::fmt::Display;
use std::future::Future;
use tokio::task::JoinHandle;

/// Spawn `fut` on the runtime and log its outcome under `task`.
///
/// The handle is only useful to tests that need to wait for completion.
pub fn spawn_best_effort<F, E>(task: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        let start = std::time::Instant::now();
        match fut.await {
            Ok(()) => {
                tracing::debug!(
                    task,
                    duration_ms = %start.elapsed().as_millis(),
                    "Background task finished"
                );
            }
            Err(e) => {
                tracing::warn!(task, error = %e, "Background task failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_runs_to_completion() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let handle = spawn_best_effort("flag", async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, String>(())
        });
        handle.await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let handle = spawn_best_effort("fails", async { Err::<(), _>("disk full") });
        assert!(handle.await.is_ok());
    }
}
