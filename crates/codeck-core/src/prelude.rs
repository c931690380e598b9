//! Convenience re-exports for downstream crates.

pub use crate::atomic::{write_atomic, ActiveWriteGuard, AtomicWriteError};
pub use crate::dirs::CodeckWorkspace;
pub use crate::error::{CodeckError, CodeckResult, ErrorBody};
pub use crate::ids::{content_hash, path_id};
