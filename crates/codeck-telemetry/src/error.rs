//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while configuring or initialising telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The supplied [`crate::LogConfig`] was invalid.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The global subscriber was already installed.
    #[error("initialization error: {0}")]
    InitError(String),

    /// Opening or rotating a log file failed.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
