//! codeck-telemetry - logging and tracing for the codeck daemon.
//!
//! This crate provides:
//! - Configurable logging setup with multiple formats
//! - Request context for correlation across operations
//! - Integration with the `tracing` ecosystem
//!
//! # Example
//!
//! ```rust,no_run
//! use codeck_telemetry::{LogConfig, LogFormat, setup_logging, RequestContext};
//!
//! # fn main() -> Result<(), codeck_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("codeck_pty=trace");
//!
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("my_component").with_operation("process_request");
//! let _guard = ctx.enter();
//! tracing::info!("processing request");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::{RequestContext, RequestGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{setup_default_logging, setup_logging, LogConfig, LogFormat, LogTarget};
