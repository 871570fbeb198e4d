//! Error types for rulesync-index

use thiserror::Error;

/// Search index errors
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Invalid query '{query}': {message}")]
    QueryParse { query: String, message: String },

    #[error("Invalid document '{id}': {message}")]
    InvalidDocument { id: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IndexError {
    pub fn invalid_document(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, IndexError>;
