//! codeck-config - layered configuration loading for the codeck daemon.
//!
//! Loads `defaults.toml` (embedded), then merges system, user, and
//! workspace config files in increasing precedence, then applies
//! environment variable overrides (§6), then validates the result.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod prelude;

mod env;
mod error;
mod loader;
mod merge;
mod show;
mod types;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::load;
pub use show::{ConfigLayer, FieldSources, ResolvedConfig};
pub use types::{
    AgentsSection, Config, GatewaySection, IndexerSection, LoggingSection, MemorySection,
    SessionsSection, WorkspaceSection,
};
