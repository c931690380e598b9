//! PTY manager error types.

use thiserror::Error;

/// Errors from spawning, attaching to, and destroying PTY sessions.
#[derive(Debug, Error)]
pub enum PtyError {
    /// The working directory does not exist or is not a directory.
    #[error("working directory does not exist: {0}")]
    InvalidCwd(std::path::PathBuf),

    /// `MAX_SESSIONS` concurrent sessions are already running.
    #[error("maximum concurrent sessions reached ({0})")]
    TooManySessions(usize),

    /// No session exists with the given id.
    #[error("no such session: {0}")]
    SessionNotFound(uuid::Uuid),

    /// Requested dimensions are out of the allowed bounds.
    #[error("invalid pty dimensions: {cols}x{rows}")]
    InvalidDimensions {
        /// Requested columns.
        cols: u16,
        /// Requested rows.
        rows: u16,
    },

    /// No transcript could be located to satisfy a resume policy.
    #[error("no transcript found to resume for cwd {0}")]
    NoTranscriptToResume(std::path::PathBuf),

    /// Spawning the native pty or child process failed.
    #[error("pty spawn failed: {0}")]
    Spawn(#[from] anyhow::Error),

    /// A filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Atomic persistence of the session snapshot failed.
    #[error("snapshot write failed: {0}")]
    Write(#[from] codeck_core::atomic::AtomicWriteError),
}

/// Result type for PTY manager operations.
pub type PtyResult<T> = Result<T, PtyError>;
