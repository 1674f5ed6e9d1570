//! Storage seams used by the chat service
//!
//! These traits let the service run against mock stores in tests.

use crate::db::{Database, DbResult, Fact, NewTurn, Turn};
use async_trait::async_trait;
use std::sync::Arc;

/// Titles are the first characters of the opening user message
pub const TITLE_CHARS: usize = 40;

/// Learned facts, one per (owner, key)
#[async_trait]
pub trait FactStore: Send + Sync {
    /// Insert or overwrite the value for (owner, key)
    async fn upsert_fact(&self, owner: &str, key: &str, value: &str) -> DbResult<()>;

    async fn list_facts(&self, owner: &str) -> DbResult<Vec<Fact>>;
}

/// Recent conversation turns for an owner
#[async_trait]
pub trait HistoryWindow: Send + Sync {
    /// The last `limit` turns across all of the owner's chats, oldest first
    async fn recent_turns(&self, owner: &str, limit: usize) -> DbResult<Vec<Turn>>;

    /// Write turns atomically, keeping their relative order
    async fn append_turns(&self, turns: &[NewTurn]) -> DbResult<Vec<Turn>>;
}

/// Maps conversations to durable ids
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Return `client_id` unchanged if given, else create a chat titled
    /// from `seed_title` and return its new id.
    async fn ensure_session(
        &self,
        owner: &str,
        client_id: Option<&str>,
        seed_title: &str,
    ) -> DbResult<String>;
}

/// Combined storage trait for convenience
pub trait Storage: FactStore + HistoryWindow + SessionRegistry {}
impl<T: FactStore + HistoryWindow + SessionRegistry> Storage for T {}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: FactStore + ?Sized> FactStore for Arc<T> {
    async fn upsert_fact(&self, owner: &str, key: &str, value: &str) -> DbResult<()> {
        (**self).upsert_fact(owner, key, value).await
    }

    async fn list_facts(&self, owner: &str) -> DbResult<Vec<Fact>> {
        (**self).list_facts(owner).await
    }
}

#[async_trait]
impl<T: HistoryWindow + ?Sized> HistoryWindow for Arc<T> {
    async fn recent_turns(&self, owner: &str, limit: usize) -> DbResult<Vec<Turn>> {
        (**self).recent_turns(owner, limit).await
    }

    async fn append_turns(&self, turns: &[NewTurn]) -> DbResult<Vec<Turn>> {
        (**self).append_turns(turns).await
    }
}

#[async_trait]
impl<T: SessionRegistry + ?Sized> SessionRegistry for Arc<T> {
    async fn ensure_session(
        &self,
        owner: &str,
        client_id: Option<&str>,
        seed_title: &str,
    ) -> DbResult<String> {
        (**self).ensure_session(owner, client_id, seed_title).await
    }
}

// ============================================================================
// Production Adapter
// ============================================================================

/// Adapter to use Database as Storage
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FactStore for DatabaseStorage {
    async fn upsert_fact(&self, owner: &str, key: &str, value: &str) -> DbResult<()> {
        self.db.upsert_fact(owner, key, value)
    }

    async fn list_facts(&self, owner: &str) -> DbResult<Vec<Fact>> {
        self.db.list_facts(owner)
    }
}

#[async_trait]
impl HistoryWindow for DatabaseStorage {
    async fn recent_turns(&self, owner: &str, limit: usize) -> DbResult<Vec<Turn>> {
        self.db.recent_turns(owner, limit)
    }

    async fn append_turns(&self, turns: &[NewTurn]) -> DbResult<Vec<Turn>> {
        self.db.append_turns(turns)
    }
}

#[async_trait]
impl SessionRegistry for DatabaseStorage {
    async fn ensure_session(
        &self,
        owner: &str,
        client_id: Option<&str>,
        seed_title: &str,
    ) -> DbResult<String> {
        if let Some(id) = client_id {
            return Ok(id.to_string());
        }

        let id = uuid::Uuid::new_v4().to_string();
        let title = session_title(seed_title);
        let chat = self.db.create_chat(&id, owner, Some(&title))?;
        tracing::info!(chat_id = %chat.id, owner, "Created chat");
        Ok(chat.id)
    }
}

/// First [`TITLE_CHARS`] characters of the seed
pub fn session_title(seed: &str) -> String {
    seed.chars().take(TITLE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> DatabaseStorage {
        DatabaseStorage::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_new_session_gets_uuid_and_title() {
        let store = storage();
        let seed = "Please remember everything I tell you about the quarterly board meeting";
        let id = store.ensure_session("u1", None, seed).await.unwrap();

        assert!(uuid::Uuid::parse_str(&id).is_ok());
        let chat = store.db.get_chat(&id).unwrap();
        assert_eq!(chat.owner, "u1");
        let expected: String = seed.chars().take(40).collect();
        assert_eq!(chat.title, Some(expected));
    }

    #[tokio::test]
    async fn test_supplied_id_is_reused() {
        let store = storage();
        let id = store.ensure_session("u1", None, "hello").await.unwrap();
        let again = store.ensure_session("u1", Some(&id), "hello").await.unwrap();

        assert_eq!(id, again);
        assert_eq!(store.db.list_chats(Some("u1")).unwrap().len(), 1);
    }

    #[test]
    fn test_title_counts_characters_not_bytes() {
        let seed = "é".repeat(50);
        assert_eq!(session_title(&seed).chars().count(), 40);
        assert_eq!(session_title("short"), "short");
    }
}
