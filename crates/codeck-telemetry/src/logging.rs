//! Logging setup: one entry point (`setup_logging`) that every binary and
//! every integration test calls to install the global `tracing` subscriber.

use std::path::PathBuf;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

use crate::error::{TelemetryError, TelemetryResult};

static INIT: Once = Once::new();

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, coloured, multi-line — the development default.
    Pretty,
    /// Single-line, human-readable — compact for a foreground terminal.
    Compact,
    /// Newline-delimited JSON — the production default, consumed by log
    /// aggregators.
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// Standard error.
    Stderr,
    /// A daily-rotated file under the given directory.
    RotatingFile {
        /// Directory to write rotated files into.
        directory: PathBuf,
        /// File name prefix for each day's file.
        file_name_prefix: String,
    },
}

/// Logging configuration, built with the builder methods below and passed
/// to [`setup_logging`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    base_level: String,
    format: LogFormat,
    target: LogTarget,
    extra_directives: Vec<String>,
}

impl LogConfig {
    /// Start a config with the given base level (`"info"`, `"debug"`, ...).
    #[must_use]
    pub fn new(base_level: impl Into<String>) -> Self {
        Self {
            base_level: base_level.into(),
            format: LogFormat::Pretty,
            target: LogTarget::Stderr,
            extra_directives: Vec::new(),
        }
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the output target.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    /// Add a per-module `EnvFilter` directive, e.g. `"codeck_pty=trace"`.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.extra_directives.push(directive.into());
        self
    }

    /// Build a config from `RUST_LOG` / `CODECK_LOG_FORMAT` env vars,
    /// falling back to `info` / [`LogFormat::Pretty`].
    #[must_use]
    pub fn from_env() -> Self {
        let base_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let format = match std::env::var("CODECK_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        };
        Self::new(base_level).with_format(format)
    }

    fn build_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut directive_str = self.base_level.clone();
        for extra in &self.extra_directives {
            directive_str.push(',');
            directive_str.push_str(extra);
        }
        EnvFilter::try_new(&directive_str)
            .map_err(|e| TelemetryError::ConfigError(format!("invalid filter {directive_str:?}: {e}")))
    }
}

/// Install the global `tracing` subscriber described by `config`.
///
/// Calling this more than once is a no-op on the second and later calls
/// (common in tests that each spin up their own daemon instance).
///
/// # Errors
///
/// Returns [`TelemetryError::ConfigError`] if the filter directives are
/// malformed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.build_filter()?;
    let mut init_err = None;
    INIT.call_once(|| {
        let result = match (&config.target, config.format) {
            (LogTarget::Stderr, LogFormat::Json) => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init(),
            (LogTarget::Stderr, LogFormat::Compact) => tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init(),
            (LogTarget::Stderr, LogFormat::Pretty) => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init(),
            (LogTarget::RotatingFile { directory, file_name_prefix }, format) => {
                let appender = tracing_appender::rolling::daily(directory, file_name_prefix);
                match format {
                    LogFormat::Json => tracing_subscriber::fmt()
                        .json()
                        .with_env_filter(filter)
                        .with_writer(appender)
                        .with_ansi(false)
                        .try_init(),
                    LogFormat::Compact => tracing_subscriber::fmt()
                        .compact()
                        .with_env_filter(filter)
                        .with_writer(appender)
                        .with_ansi(false)
                        .try_init(),
                    LogFormat::Pretty => tracing_subscriber::fmt()
                        .pretty()
                        .with_env_filter(filter)
                        .with_writer(appender)
                        .with_ansi(false)
                        .try_init(),
                }
            }
        };
        if let Err(e) = result {
            init_err = Some(TelemetryError::InitError(e.to_string()));
        }
    });
    match init_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Install logging from `RUST_LOG`/`CODECK_LOG_FORMAT` with no further
/// configuration; the common case for `codeck-daemon`'s `main`.
///
/// # Errors
///
/// See [`setup_logging`].
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::from_env())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_directives() {
        let config = LogConfig::new("info")
            .with_format(LogFormat::Json)
            .with_directive("codeck_pty=trace")
            .with_directive("codeck_auth=debug");
        let filter = config.build_filter().expect("valid filter");
        assert_eq!(filter.to_string(), "info,codeck_pty=trace,codeck_auth=debug");
    }

    #[test]
    fn setup_logging_is_idempotent() {
        let config = LogConfig::new("info");
        setup_logging(&config).expect("first install");
        // Second call must not panic or error even though the global
        // subscriber is already installed.
        setup_logging(&config).expect("second call is a no-op");
    }
}
