//! Mock implementations for testing
//!
//! These mocks let the chat service and HTTP layer run without a model
//! provider or a working store.

use super::store::{FactStore, HistoryWindow, SessionRegistry};
use crate::db::{DbError, DbResult, Fact, NewTurn, Turn};
use crate::generation::{GenerationDelegate, GenerationRequest};
use crate::llm::{LlmError, TextStream};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Mutex;

// ============================================================================
// Mock Generation Delegate
// ============================================================================

enum MockReply {
    /// Yield these items then end
    Items(Vec<Result<String, LlmError>>),
    /// Yield these deltas then never finish
    Hang(Vec<String>),
    /// Fail to open the stream
    OpenFailure(LlmError),
}

/// Delegate that replays queued replies and records every request
#[derive(Default)]
pub struct MockDelegate {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a stream that yields `chunks` and completes
    pub fn queue_text(&self, chunks: &[&str]) {
        let items = chunks.iter().map(|c| Ok((*c).to_string())).collect();
        self.push(MockReply::Items(items));
    }

    /// Queue a stream that yields `chunks` then fails with `error`
    pub fn queue_failing_stream(&self, chunks: &[&str], error: LlmError) {
        let mut items: Vec<_> = chunks.iter().map(|c| Ok((*c).to_string())).collect();
        items.push(Err(error));
        self.push(MockReply::Items(items));
    }

    /// Queue a stream that yields `chunks` and then stalls forever
    pub fn queue_hanging_stream(&self, chunks: &[&str]) {
        let chunks = chunks.iter().map(|c| (*c).to_string()).collect();
        self.push(MockReply::Hang(chunks));
    }

    /// Queue a failure to open the stream
    pub fn queue_open_failure(&self, error: LlmError) {
        self.push(MockReply::OpenFailure(error));
    }

    /// Get recorded requests
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn push(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }
}

#[async_trait]
impl GenerationDelegate for MockDelegate {
    async fn generate(&self, request: GenerationRequest) -> Result<TextStream, LlmError> {
        self.requests.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();

        match reply {
            Some(MockReply::Items(items)) => Ok(Box::pin(stream::iter(items))),
            Some(MockReply::Hang(chunks)) => {
                let stalled = stream::pending::<Result<String, LlmError>>();
                Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok)).chain(stalled)))
            }
            Some(MockReply::OpenFailure(e)) => Err(e),
            None => Err(LlmError::no_model("No mock reply queued")),
        }
    }
}

// ============================================================================
// Failing Storage
// ============================================================================

/// Store whose every call fails as if the database were locked
pub struct FailingStorage;

fn busy() -> DbError {
    DbError::Sqlite(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
        Some("database is locked".to_string()),
    ))
}

#[async_trait]
impl FactStore for FailingStorage {
    async fn upsert_fact(&self, _owner: &str, _key: &str, _value: &str) -> DbResult<()> {
        Err(busy())
    }

    async fn list_facts(&self, _owner: &str) -> DbResult<Vec<Fact>> {
        Err(busy())
    }
}

#[async_trait]
impl HistoryWindow for FailingStorage {
    async fn recent_turns(&self, _owner: &str, _limit: usize) -> DbResult<Vec<Turn>> {
        Err(busy())
    }

    async fn append_turns(&self, _turns: &[NewTurn]) -> DbResult<Vec<Turn>> {
        Err(busy())
    }
}

#[async_trait]
impl SessionRegistry for FailingStorage {
    async fn ensure_session(
        &self,
        _owner: &str,
        _client_id: Option<&str>,
        _seed_title: &str,
    ) -> DbResult<String> {
        Err(busy())
    }
}
