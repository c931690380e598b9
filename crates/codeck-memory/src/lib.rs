//! Hierarchical markdown/JSONL memory store and session transcript
//! capture for the codeck daemon: secret-redacted atomic writes, stable
//! `pathId` resolution, buffered transcript capture, and no-LLM
//! post-session summarisation.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod paths;
pub mod prelude;
pub mod sanitize;
pub mod store;
pub mod summary;
pub mod transcript;

pub use error::{MemoryError, MemoryResult};
pub use store::MemoryStore;
