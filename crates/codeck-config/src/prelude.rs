//! Convenience re-exports.

pub use crate::error::{ConfigError, ConfigResult};
pub use crate::loader::load;
pub use crate::show::{ConfigLayer, FieldSources, ResolvedConfig};
pub use crate::types::Config;
