//! Convenience re-exports for consumers of this crate.

pub use crate::chunk::{chunk_jsonl, chunk_markdown, Chunk, ChunkMetadata};
pub use crate::embed::{EmbedJob, EmbedQueue, EmbeddingProvider};
pub use crate::error::{IndexError, IndexResult};
pub use crate::store::{IndexStore, SearchHit};
pub use crate::watcher::spawn_index_watcher;
