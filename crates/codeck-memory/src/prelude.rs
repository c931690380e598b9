//! Convenience re-exports for consumers of this crate.

pub use crate::error::{MemoryError, MemoryResult};
pub use crate::paths::PathResolver;
pub use crate::sanitize::{sanitize, strip_ansi};
pub use crate::store::{MemoryStore, Scope, SharedMemoryStore};
pub use crate::summary::{summarize_transcript, SessionSummary};
pub use crate::transcript::{CompactionCallback, Role, TranscriptWriter};
