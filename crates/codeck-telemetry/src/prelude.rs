//! Prelude module - commonly used types for convenient import.
//!
//! Use `use codeck_telemetry::prelude::*;` to import all essential types.

pub use crate::{
    setup_default_logging, setup_logging, LogConfig, LogFormat, LogTarget, RequestContext,
    RequestGuard, TelemetryError, TelemetryResult,
};
