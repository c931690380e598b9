//! Atomic, crash-safe file writes shared by every persistence-owning crate.
//!
//! The pattern is always: write to a sibling temp file, `fsync`, then
//! rename over the destination. A reader either observes the old content or
//! the new content in full, never a partial write. A per-path guard detects
//! and rejects re-entrant concurrent writers to the same path rather than
//! silently interleaving them.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::dirs::secure_file;

/// Tracks paths with a write currently in flight, so a second concurrent
/// writer to the same path is rejected instead of racing the first.
#[derive(Debug, Default)]
pub struct ActiveWriteGuard {
    active: Mutex<HashSet<PathBuf>>,
}

impl ActiveWriteGuard {
    /// Create an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to claim `path` for writing. Returns `Err` if another write
    /// to the same path is already in flight.
    fn claim(&self, path: &Path) -> Result<(), AtomicWriteError> {
        let mut active = self.active.lock().expect("active-write lock poisoned");
        if !active.insert(path.to_path_buf()) {
            return Err(AtomicWriteError::Reentrant(path.to_path_buf()));
        }
        Ok(())
    }

    fn release(&self, path: &Path) {
        let mut active = self.active.lock().expect("active-write lock poisoned");
        active.remove(path);
    }
}

/// Errors from an atomic write.
#[derive(Debug, thiserror::Error)]
pub enum AtomicWriteError {
    /// A concurrent write to the same path is already in flight.
    #[error("concurrent write already in flight for {0:?}")]
    Reentrant(PathBuf),

    /// The underlying filesystem operation failed.
    #[error("io error writing {path:?}: {source}")]
    Io {
        /// Path that failed to write.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Atomically write `contents` to `path`: writes a `.tmp-<pid>` sibling,
/// syncs it, renames over `path`, and sets mode `0600`. If any step fails
/// the temp file is removed and the destination is left untouched.
///
/// # Errors
///
/// Returns [`AtomicWriteError`] if another write to `path` is in flight, or
/// if any filesystem operation fails.
pub async fn write_atomic(
    guard: &ActiveWriteGuard,
    path: &Path,
    contents: &[u8],
) -> Result<(), AtomicWriteError> {
    guard.claim(path)?;
    let result = write_atomic_inner(path, contents).await;
    guard.release(path);
    result
}

async fn write_atomic_inner(path: &Path, contents: &[u8]) -> Result<(), AtomicWriteError> {
    let tmp_path = tmp_sibling(path);
    let io_err = |source: io::Error| AtomicWriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let write_result: Result<(), io::Error> = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        use tokio::io::AsyncWriteExt;
        file.write_all(contents).await?;
        file.sync_all().await?;
        Ok(())
    }
    .await;

    if let Err(e) = write_result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(io_err(e));
    }

    if let Err(e) = secure_file(&tmp_path) {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(io_err(e));
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(io_err(e));
    }

    Ok(())
}

/// Remove `path` if it exists; used when the last entry of a persisted
/// collection is gone and the file must not be left behind as an empty
/// shell (e.g. the PTY snapshot, or `sessions.json` with zero sessions).
///
/// # Errors
///
/// Returns an error if removal fails for a reason other than the file
/// already being absent.
pub async fn remove_if_present(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "tmp".to_string());
    let tmp_name = format!(".{file_name}.tmp-{}", std::process::id());
    path.with_file_name(tmp_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("sub/file.json");
        let guard = ActiveWriteGuard::new();
        write_atomic(&guard, &path, b"{\"a\":1}").await.expect("write");
        let read = tokio::fs::read(&path).await.expect("read");
        assert_eq!(read, b"{\"a\":1}");
    }

    #[tokio::test]
    async fn no_temp_file_left_behind_on_success() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("file.json");
        let guard = ActiveWriteGuard::new();
        write_atomic(&guard, &path, b"ok").await.expect("write");
        let tmp_path = tmp_sibling(&path);
        assert!(!tmp_path.exists());
    }

    #[test]
    fn reentrant_claim_is_rejected() {
        let guard = ActiveWriteGuard::new();
        let path = PathBuf::from("/tmp/x.json");
        guard.claim(&path).expect("first claim");
        let err = guard.claim(&path).unwrap_err();
        assert!(matches!(err, AtomicWriteError::Reentrant(_)));
        guard.release(&path);
        guard.claim(&path).expect("claim after release");
    }

    #[tokio::test]
    async fn remove_if_present_is_idempotent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("gone.json");
        remove_if_present(&path).await.expect("remove missing ok");
        tokio::fs::write(&path, b"x").await.expect("write");
        remove_if_present(&path).await.expect("remove existing ok");
        assert!(!path.exists());
    }
}
