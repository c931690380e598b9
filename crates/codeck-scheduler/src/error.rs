//! Scheduler error types.

use thiserror::Error;

/// Errors from creating, updating, and running scheduled agents.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No agent exists with the given id.
    #[error("no such agent: {0}")]
    AgentNotFound(String),

    /// The cron expression could not be parsed.
    #[error("invalid cron expression {0:?}: {1}")]
    InvalidCron(String, String),

    /// The agent is already in `error` state and cron is disarmed.
    #[error("agent {0} is disarmed after exceeding its retry budget")]
    Disarmed(String),

    /// Both the manifest and its backup failed to load and reconstruction
    /// from the agents directory also failed.
    #[error("manifest unreadable and reconstruction failed: {0}")]
    ManifestUnreadable(String),

    /// A filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Atomic persistence of a manifest, config, state, or execution record
    /// failed.
    #[error("write failed: {0}")]
    Write(#[from] codeck_core::atomic::AtomicWriteError),

    /// A background task join failed.
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
