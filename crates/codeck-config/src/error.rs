//! Configuration error types.

use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file existed but could not be parsed as TOML.
    #[error("failed to parse {path}: {source}")]
    ParseError {
        /// File that failed to parse.
        path: String,
        /// Underlying TOML parse error.
        #[source]
        source: toml::de::Error,
    },

    /// A config file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadError {
        /// File that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A field failed post-merge validation.
    #[error("invalid {field}: {message}")]
    ValidationError {
        /// Dotted field path, e.g. `"sessions.max_sessions"`.
        field: String,
        /// Human-readable explanation.
        message: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
