//! Database schema and types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS chats (
    id TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    title TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chats_owner ON chats(owner, created_at DESC);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id TEXT NOT NULL,
    owner TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_owner ON messages(owner, created_at DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id, created_at, id);

CREATE TABLE IF NOT EXISTS memories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT NOT NULL,
    key_text TEXT NOT NULL,
    value TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS memories_owner_key_text ON memories(owner, key_text);
";

/// Chat session record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chat {
    pub id: String,
    pub owner: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A learned key/value fact attributed to an owner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fact {
    pub owner: String,
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Who authored a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Persisted message record
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Turn {
    pub id: i64,
    pub chat_id: String,
    pub owner: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A turn that has not been written yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewTurn {
    pub chat_id: String,
    pub owner: String,
    pub role: Role,
    pub content: String,
}

impl NewTurn {
    pub fn user(chat_id: &str, owner: &str, content: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            owner: owner.to_string(),
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(chat_id: &str, owner: &str, content: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            owner: owner.to_string(),
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
