//! API request and response types

use crate::db::{Chat, Role, Turn};
use crate::llm::LlmMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to run one chat turn
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnRequest {
    pub messages: Vec<IncomingMessage>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Message as sent by the chat client
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub role: IncomingRole,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomingRole {
    User,
    Assistant,
    /// Client-side system prompts; the server builds its own
    System,
}

impl IncomingMessage {
    /// Conversation message, or `None` for client system prompts
    pub fn into_llm_message(self) -> Option<LlmMessage> {
        match self.role {
            IncomingRole::User => Some(LlmMessage::user(self.content)),
            IncomingRole::Assistant => Some(LlmMessage::assistant(self.content)),
            IncomingRole::System => None,
        }
    }
}

/// Request to draft a support reply
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftReplyRequest {
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
}

/// Request to draft a knowledge-base answer
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
}

/// Generated draft
#[derive(Debug, Serialize)]
pub struct DraftResponse {
    pub draft: String,
}

/// One row of the chat list
#[derive(Debug, Serialize)]
pub struct ChatSummary {
    pub id: String,
    pub title: Option<String>,
    pub created: DateTime<Utc>,
}

impl From<Chat> for ChatSummary {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id,
            title: chat.title,
            created: chat.created_at,
        }
    }
}

/// One entry of a chat timeline
#[derive(Debug, Serialize)]
pub struct TimelineEntry {
    pub role: Role,
    pub content: String,
}

impl From<Turn> for TimelineEntry {
    fn from(turn: Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content,
        }
    }
}

/// Model information with metadata
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    pub description: String,
    pub context_window: usize,
}

/// Response for model list
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
