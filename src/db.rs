//! Database module for the recall service
//!
//! Provides persistence for chats, turns and learned facts.

mod schema;

pub use schema::*;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Chat not found: {0}")]
    ChatNotFound(String),
}

impl DbError {
    /// Busy/locked conditions and I/O faults clear up on their own.
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy
                    | rusqlite::ErrorCode::DatabaseLocked
                    | rusqlite::ErrorCode::SystemIoFailure
                    | rusqlite::ErrorCode::CannotOpen
            ),
            _ => false,
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave a half-applied
        // statement behind, so the connection is still usable.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Chat Operations ====================

    /// Create a new chat session
    pub fn create_chat(&self, id: &str, owner: &str, title: Option<&str>) -> DbResult<Chat> {
        let conn = self.conn();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO chats (id, owner, title, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, owner, title, format_timestamp(now)],
        )?;

        Ok(Chat {
            id: id.to_string(),
            owner: owner.to_string(),
            title: title.map(String::from),
            created_at: now,
        })
    }

    /// Get chat by ID
    #[allow(dead_code)] // Used in tests
    pub fn get_chat(&self, id: &str) -> DbResult<Chat> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, owner, title, created_at FROM chats WHERE id = ?1")?;

        stmt.query_row(params![id], parse_chat_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => DbError::ChatNotFound(id.to_string()),
                other => DbError::Sqlite(other),
            })
    }

    /// List chats, newest first. `None` lists every owner's chats.
    pub fn list_chats(&self, owner: Option<&str>) -> DbResult<Vec<Chat>> {
        let conn = self.conn();
        let chats = if let Some(owner) = owner {
            let mut stmt = conn.prepare(
                "SELECT id, owner, title, created_at FROM chats
                 WHERE owner = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map(params![owner], parse_chat_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        } else {
            let mut stmt = conn
                .prepare("SELECT id, owner, title, created_at FROM chats ORDER BY created_at DESC")?;
            let rows = stmt.query_map([], parse_chat_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        Ok(chats)
    }

    // ==================== Fact Operations ====================

    /// Insert or overwrite the fact for `(owner, key)`.
    ///
    /// Relies on the unique index so concurrent writers of the same key
    /// collapse into one row; the last write wins.
    pub fn upsert_fact(&self, owner: &str, key: &str, value: &str) -> DbResult<()> {
        let conn = self.conn();
        let now = format_timestamp(Utc::now());

        conn.execute(
            "INSERT INTO memories (owner, key_text, value, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(owner, key_text) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![owner, key, value, now],
        )?;
        Ok(())
    }

    /// All facts known for an owner. Order is unspecified.
    pub fn list_facts(&self, owner: &str) -> DbResult<Vec<Fact>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT owner, key_text, value, updated_at FROM memories WHERE owner = ?1")?;

        let facts = stmt
            .query_map(params![owner], |row| {
                Ok(Fact {
                    owner: row.get(0)?,
                    key: row.get(1)?,
                    value: row.get(2)?,
                    updated_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(facts)
    }

    // ==================== Turn Operations ====================

    /// Write turns in one transaction, keeping their relative order.
    pub fn append_turns(&self, turns: &[NewTurn]) -> DbResult<Vec<Turn>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = Utc::now();
        let created_at = format_timestamp(now);

        let mut written = Vec::with_capacity(turns.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO messages (chat_id, owner, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for turn in turns {
                stmt.execute(params![
                    turn.chat_id,
                    turn.owner,
                    turn.role.as_str(),
                    turn.content,
                    created_at
                ])?;
                written.push(Turn {
                    id: tx.last_insert_rowid(),
                    chat_id: turn.chat_id.clone(),
                    owner: turn.owner.clone(),
                    role: turn.role,
                    content: turn.content.clone(),
                    created_at: now,
                });
            }
        }
        tx.commit()?;

        Ok(written)
    }

    /// The owner's latest `limit` turns across all chats, oldest first.
    pub fn recent_turns(&self, owner: &str, limit: usize) -> DbResult<Vec<Turn>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, owner, role, content, created_at FROM messages
             WHERE owner = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut turns = stmt
            .query_map(params![owner, limit], parse_turn_row)?
            .collect::<Result<Vec<_>, _>>()?;
        turns.reverse();
        Ok(turns)
    }

    /// Full timeline of one chat, oldest first.
    pub fn chat_turns(&self, chat_id: &str) -> DbResult<Vec<Turn>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, owner, role, content, created_at FROM messages
             WHERE chat_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;

        let turns = stmt
            .query_map(params![chat_id], parse_turn_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(turns)
    }
}

fn parse_chat_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    Ok(Chat {
        id: row.get(0)?,
        owner: row.get(1)?,
        title: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

fn parse_turn_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Turn> {
    let role: String = row.get(3)?;
    let role = role.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(Turn {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        owner: row.get(2)?,
        role,
        content: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

/// Fixed-width UTC timestamps so that text order equals time order.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
