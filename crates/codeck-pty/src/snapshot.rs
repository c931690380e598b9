//! Crash-safe persistence of the live session set, restored on startup.

use std::path::PathBuf;
use std::sync::Arc;

use codeck_core::atomic::{remove_if_present, write_atomic, ActiveWriteGuard};

use crate::error::PtyResult;
use crate::types::PtySnapshot;

/// Owns the snapshot file path and the write-serialisation guard.
pub struct SnapshotStore {
    path: PathBuf,
    guard: Arc<ActiveWriteGuard>,
}

impl SnapshotStore {
    /// Point at `path` (typically `state/sessions.json`).
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path, guard: Arc::new(ActiveWriteGuard::new()) }
    }

    /// Write `snapshot`, or remove the file entirely when there are no
    /// entries (so a zero-session shutdown never leaves a phantom file
    /// that would trigger a restore on next boot).
    pub async fn save(&self, snapshot: &PtySnapshot) -> PtyResult<()> {
        if snapshot.entries.is_empty() {
            remove_if_present(&self.path).await?;
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.guard, &self.path, &bytes).await?;
        Ok(())
    }

    /// Load the persisted snapshot, if any.
    pub async fn load(&self) -> PtyResult<Option<PtySnapshot>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Rename the snapshot to `.bak` so a crash mid-restore does not loop
    /// the same restore forever on the next boot.
    pub async fn mark_restored(&self) -> PtyResult<()> {
        let bak = self.path.with_extension("json.bak");
        match tokio::fs::rename(&self.path, &bak).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
