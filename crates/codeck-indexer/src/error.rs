//! Indexer error types.

use thiserror::Error;

/// Errors from indexing and query operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The requested item was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying sqlite database returned an error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking database task panicked or was cancelled.
    #[error("database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for indexer operations.
pub type IndexResult<T> = Result<T, IndexError>;
