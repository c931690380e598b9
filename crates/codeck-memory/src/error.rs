//! Memory store error types.

use thiserror::Error;

/// Errors from memory and transcript operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Two distinct canonical paths hashed to the same 12-hex `pathId`
    /// prefix. Treated as a hard error since path scoping depends on this
    /// being unique.
    #[error("pathId collision for {new_path:?}: already assigned to {existing_path:?}")]
    PathIdCollision {
        /// The path being resolved.
        new_path: std::path::PathBuf,
        /// The path already holding that id.
        existing_path: std::path::PathBuf,
    },

    /// A filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An atomic write could not be completed.
    #[error("write failed: {0}")]
    Write(#[from] codeck_core::atomic::AtomicWriteError),
}

/// Result type for memory store operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
