//! Chat turn orchestration
//!
//! Loads what the owner has taught so far, resolves the turn, applies the
//! branch's effects and hands back either a templated reply or a live
//! generation stream.

use super::classifier::{PatternClassifier, UtteranceClassifier};
use super::resolver::{resolve, Branch, BranchKind, TurnContext};
use super::store::Storage;
use crate::background::spawn_best_effort;
use crate::db::{DbError, NewTurn, Turn};
use crate::generation::{GenerationDelegate, GenerationRequest};
use crate::llm::{LlmError, LlmMessage, MessageRole, TextStream};
use crate::system_prompt::build_system_directive;
use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

/// Turns of history loaded per request unless configured otherwise
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Deltas buffered between the generation pump and the response body
const CHUNK_BUFFER: usize = 32;

/// One incoming turn
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub owner: Option<String>,
    pub chat_id: Option<String>,
    /// Conversation as sent by the client; the last entry is the new
    /// user utterance.
    pub messages: Vec<LlmMessage>,
    pub model: Option<String>,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("No owner supplied for this turn")]
    MissingOwner,
    #[error("Conversation has no messages")]
    EmptyConversation,
    #[error("Last message must come from the user")]
    NotUserTurn,
    #[error("User message is empty")]
    EmptyMessage,
    #[error(transparent)]
    Store(#[from] DbError),
    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),
}

impl TurnError {
    /// Rejected before any side effect; the caller sent a bad request.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            TurnError::MissingOwner
                | TurnError::EmptyConversation
                | TurnError::NotUserTurn
                | TurnError::EmptyMessage
        )
    }
}

/// Result of a successful turn
#[derive(Debug)]
pub struct TurnReply {
    pub chat_id: String,
    pub body: ReplyBody,
}

#[derive(Debug)]
pub enum ReplyBody {
    /// Answered without the model; both turns are already stored.
    Templated { branch: BranchKind, text: String },
    /// Answer is being generated.
    Streamed(GenerationHandle),
}

/// Live generation feeding a response body
#[derive(Debug)]
pub struct GenerationHandle {
    /// Text deltas; an `Err` item is the last one sent.
    pub chunks: mpsc::Receiver<Result<String, LlmError>>,
    /// Completes once the assistant turn has been written (or skipped).
    #[allow(dead_code)] // Awaited in tests
    pub persisted: JoinHandle<()>,
}

impl GenerationHandle {
    /// Body stream for the response. Dropping it cancels generation.
    pub fn into_stream(self) -> ReceiverStream<Result<String, LlmError>> {
        ReceiverStream::new(self.chunks)
    }
}

/// How the pump stopped
#[derive(Debug)]
enum PumpEnd {
    Completed,
    Cancelled,
    Failed(LlmError),
}

pub struct ChatService {
    storage: Arc<dyn Storage>,
    delegate: Arc<dyn GenerationDelegate>,
    classifier: Arc<dyn UtteranceClassifier>,
    history_limit: usize,
}

impl ChatService {
    pub fn new(storage: Arc<dyn Storage>, delegate: Arc<dyn GenerationDelegate>) -> Self {
        Self {
            storage,
            delegate,
            classifier: Arc::new(PatternClassifier),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    #[must_use]
    #[allow(dead_code)] // Alternate classifiers are injected in tests
    pub fn with_classifier(mut self, classifier: Arc<dyn UtteranceClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Run one turn end to end.
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnReply, TurnError> {
        let owner = request
            .owner
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .ok_or(TurnError::MissingOwner)?
            .to_string();
        let last = request.messages.last().ok_or(TurnError::EmptyConversation)?;
        if last.role != MessageRole::User {
            return Err(TurnError::NotUserTurn);
        }
        let user_message = last.content.trim().to_string();
        if user_message.is_empty() {
            return Err(TurnError::EmptyMessage);
        }

        // Snapshot before this turn writes anything
        let facts = self.storage.list_facts(&owner).await?;
        let history = self
            .storage
            .recent_turns(&owner, self.history_limit)
            .await?;

        let chat_id = self
            .storage
            .ensure_session(&owner, request.chat_id.as_deref(), &user_message)
            .await?;

        let branch = resolve(
            &TurnContext {
                user_message: &user_message,
                history: &history,
                facts: &facts,
            },
            self.classifier.as_ref(),
        );
        tracing::info!(
            owner = %owner,
            chat_id = %chat_id,
            branch = branch.kind().as_str(),
            facts = facts.len(),
            history = history.len(),
            "Resolved turn"
        );

        if let Some(text) = branch.reply() {
            self.finish_templated(&owner, &chat_id, &branch, &user_message, &text)
                .await?;
            return Ok(TurnReply {
                chat_id,
                body: ReplyBody::Templated {
                    branch: branch.kind(),
                    text,
                },
            });
        }

        // The user turn stays even if the model cannot be reached
        self.storage
            .append_turns(&[NewTurn::user(&chat_id, &owner, user_message.as_str())])
            .await?;

        let mut messages: Vec<LlmMessage> = history.iter().map(turn_to_message).collect();
        messages.extend(request.messages);

        let upstream = self
            .delegate
            .generate(GenerationRequest {
                system: build_system_directive(&facts),
                messages,
                model: request.model,
                max_tokens: None,
            })
            .await
            .inspect_err(|e| {
                tracing::error!(chat_id = %chat_id, error = %e, "Failed to open generation stream");
            })?;

        let handle = self.spawn_pump(owner, chat_id.clone(), upstream);
        Ok(TurnReply {
            chat_id,
            body: ReplyBody::Streamed(handle),
        })
    }

    async fn finish_templated(
        &self,
        owner: &str,
        chat_id: &str,
        branch: &Branch,
        user_message: &str,
        reply: &str,
    ) -> Result<(), TurnError> {
        if let Some((key, value)) = branch.fact_to_store() {
            self.storage.upsert_fact(owner, key, value).await?;
            tracing::info!(owner, key, "Stored fact");
        }
        self.storage
            .append_turns(&[
                NewTurn::user(chat_id, owner, user_message),
                NewTurn::assistant(chat_id, owner, reply),
            ])
            .await?;
        Ok(())
    }

    /// Forward deltas to the response and store the assistant turn when
    /// the stream ends, is cancelled, or fails. Only delivered text counts.
    fn spawn_pump(&self, owner: String, chat_id: String, upstream: TextStream) -> GenerationHandle {
        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        let storage = self.storage.clone();

        let persisted = spawn_best_effort("persist_assistant_turn", async move {
            let mut upstream = upstream;
            let mut delivered = String::new();

            let end = loop {
                tokio::select! {
                    biased;
                    () = tx.closed() => break PumpEnd::Cancelled,
                    next = upstream.next() => match next {
                        Some(Ok(delta)) => {
                            if tx.send(Ok(delta.clone())).await.is_err() {
                                break PumpEnd::Cancelled;
                            }
                            delivered.push_str(&delta);
                        }
                        Some(Err(e)) => {
                            // Receiver may already be gone; nothing else to tell it
                            let _ = tx.send(Err(e.clone())).await;
                            break PumpEnd::Failed(e);
                        }
                        None => break PumpEnd::Completed,
                    },
                }
            };
            // Aborts the provider request if it is still running
            drop(upstream);

            match &end {
                PumpEnd::Completed => {
                    tracing::info!(chat_id = %chat_id, chars = delivered.len(), "Generation complete");
                }
                PumpEnd::Cancelled => {
                    tracing::info!(chat_id = %chat_id, chars = delivered.len(), "Generation cancelled by client");
                }
                PumpEnd::Failed(e) => {
                    tracing::warn!(chat_id = %chat_id, chars = delivered.len(), error = %e, "Generation failed mid-stream");
                }
            }

            if delivered.is_empty() {
                return Ok(());
            }
            storage
                .append_turns(&[NewTurn::assistant(&chat_id, &owner, delivered)])
                .await
                .map(|_| ())
        });

        GenerationHandle {
            chunks: rx,
            persisted,
        }
    }
}

fn turn_to_message(turn: &Turn) -> LlmMessage {
    LlmMessage {
        role: turn.role.into(),
        content: turn.content.clone(),
    }
}
