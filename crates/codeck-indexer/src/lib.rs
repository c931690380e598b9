//! Embedded full-text search index over the `memory/` and `sessions/`
//! trees: heading-aware markdown chunking, JSONL grouping, an FTS5
//! virtual table kept in sync by triggers, an optional vector table for
//! future embedding similarity, and a debounced filesystem watcher that
//! keeps the index current.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod chunk;
pub mod embed;
pub mod error;
pub mod prelude;
pub mod schema;
pub mod store;
pub mod watcher;

pub use error::{IndexError, IndexResult};
pub use store::{IndexStore, SearchHit};
