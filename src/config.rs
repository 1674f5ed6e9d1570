//! Server configuration from the environment

use crate::chat::DEFAULT_HISTORY_LIMIT;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// SQLite file (`DESK_DB_PATH`)
    pub db_path: PathBuf,
    /// Listen port (`DESK_PORT`)
    pub port: u16,
    /// Owner used when a request names none (`DEFAULT_USER_ID`)
    pub default_owner: Option<String>,
    /// Turns of history per request (`DESK_HISTORY_LIMIT`)
    pub history_limit: usize,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Empty and unparsable values fall
    /// back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let db_path = var("DESK_DB_PATH").map_or_else(
            || {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.desk-recall/desk.db"))
            },
            PathBuf::from,
        );

        let port = var("DESK_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let history_limit = var("DESK_HISTORY_LIMIT")
            .and_then(|n| n.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_HISTORY_LIMIT);

        Self {
            db_path,
            port,
            default_owner: var("DEFAULT_USER_ID").map(|v| v.trim().to_string()),
            history_limit,
        }
    }
}
