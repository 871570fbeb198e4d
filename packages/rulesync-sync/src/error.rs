use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Storage(#[from] rulesync_storage::StorageError),

    #[error("Index error: {0}")]
    Index(#[from] rulesync_index::IndexError),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("A synchronization pass is already running for index '{0}'")]
    PassInProgress(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SyncError {
    pub fn mapping<E: std::fmt::Display>(e: E) -> Self {
        Self::Mapping(e.to_string())
    }

    pub fn checkpoint<E: std::fmt::Display>(e: E) -> Self {
        Self::Checkpoint(e.to_string())
    }

    /// Failures that leave the store or index untouched and go away on the
    /// next tick (another pass was running).
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::PassInProgress(_))
    }
}
