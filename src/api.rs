//! HTTP API for the recall service

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::chat::{ChatService, DatabaseStorage};
use crate::config::ServerConfig;
use crate::db::Database;
use crate::drafting::DraftService;
use crate::generation::GenerationDelegate;
use crate::llm::ModelRegistry;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub drafts: Arc<DraftService>,
    pub db: Database,
    pub llm_registry: Arc<ModelRegistry>,
    /// Owner for requests that name none
    pub default_owner: Option<String>,
}

impl AppState {
    pub fn new(
        db: Database,
        llm_registry: Arc<ModelRegistry>,
        delegate: Arc<dyn GenerationDelegate>,
        config: &ServerConfig,
    ) -> Self {
        let storage = Arc::new(DatabaseStorage::new(db.clone()));
        let drafts = DraftService::new(delegate.clone());
        let chat = ChatService::new(storage, delegate).with_history_limit(config.history_limit);
        Self {
            chat: Arc::new(chat),
            drafts: Arc::new(drafts),
            db,
            llm_registry,
            default_owner: config.default_owner.clone(),
        }
    }
}
