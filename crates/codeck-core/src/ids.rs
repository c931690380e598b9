//! Stable identifiers derived from content rather than randomly assigned.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Length, in hex characters, of a [`path_id`].
pub const PATH_ID_LEN: usize = 12;

/// Derive the stable `pathId` for a canonicalised absolute path: the first
/// twelve hex digits of `sha256(path)`.
///
/// Callers are expected to canonicalise (resolve symlinks, `..`, etc.)
/// before calling this so that two different spellings of the same
/// directory produce the same id.
#[must_use]
pub fn path_id(canonical_path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..PATH_ID_LEN].to_string()
}

/// Content hash used by the indexer to decide whether a file needs
/// re-chunking: the full hex-encoded sha256 of its bytes.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn path_id_is_stable_and_fixed_length() {
        let p = PathBuf::from("/home/u/code");
        let id1 = path_id(&p);
        let id2 = path_id(&p);
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), PATH_ID_LEN);
    }

    #[test]
    fn different_paths_produce_different_ids() {
        let a = path_id(&PathBuf::from("/home/u/code"));
        let b = path_id(&PathBuf::from("/home/u/other"));
        assert_ne!(a, b);
    }

    #[test]
    fn content_hash_changes_with_content() {
        let h1 = content_hash(b"hello");
        let h2 = content_hash(b"hello world");
        assert_ne!(h1, h2);
        assert_eq!(content_hash(b"hello"), h1);
    }
}
