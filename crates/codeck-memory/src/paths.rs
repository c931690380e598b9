//! Working-directory → stable `pathId` resolution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use codeck_core::atomic::{write_atomic, ActiveWriteGuard};
use codeck_core::ids::path_id;

use crate::error::{MemoryError, MemoryResult};

#[derive(Default, Serialize, Deserialize)]
struct PersistedPaths {
    #[serde(default)]
    entries: HashMap<String, PathBuf>,
}

/// Resolves canonical paths to stable `pathId`s, persisting the mapping so
/// a restart does not need to recompute it and can still catch a
/// collision against an id assigned in a prior process.
pub struct PathResolver {
    state_path: PathBuf,
    guard: ActiveWriteGuard,
    /// pathId -> canonical path that claimed it.
    entries: RwLock<HashMap<String, PathBuf>>,
}

impl PathResolver {
    /// Create a resolver persisting its mapping at `state_path`.
    #[must_use]
    pub fn new(state_path: PathBuf) -> Self {
        Self {
            state_path,
            guard: ActiveWriteGuard::new(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Load a previously persisted mapping, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub async fn load(&self) -> MemoryResult<()> {
        if !self.state_path.exists() {
            return Ok(());
        }
        let bytes = tokio::fs::read(&self.state_path).await?;
        let persisted: PersistedPaths = serde_json::from_slice(&bytes)?;
        *self.entries.write().await = persisted.entries;
        Ok(())
    }

    /// Resolve `cwd` to its stable `pathId`, assigning one if this is the
    /// first time this canonical path has been seen.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::PathIdCollision`] if the computed id already
    /// belongs to a different canonical path (a 12-hex sha256 prefix
    /// collision — treated as a hard, domain-wide invariant violation).
    pub async fn resolve(&self, cwd: &Path) -> MemoryResult<String> {
        let canonical = cwd.canonicalize().unwrap_or_else(|_| cwd.to_path_buf());
        let id = path_id(&canonical);

        {
            let entries = self.entries.read().await;
            if let Some(existing) = entries.get(&id) {
                if existing == &canonical {
                    return Ok(id);
                }
                return Err(MemoryError::PathIdCollision {
                    new_path: canonical,
                    existing_path: existing.clone(),
                });
            }
        }

        let mut entries = self.entries.write().await;
        // Re-check under the write lock in case of a concurrent insert.
        if let Some(existing) = entries.get(&id) {
            if existing == &canonical {
                return Ok(id);
            }
            return Err(MemoryError::PathIdCollision {
                new_path: canonical,
                existing_path: existing.clone(),
            });
        }
        entries.insert(id.clone(), canonical);
        let persisted = PersistedPaths {
            entries: entries.clone(),
        };
        drop(entries);
        let bytes = serde_json::to_vec_pretty(&persisted)?;
        write_atomic(&self.guard, &self.state_path, &bytes).await?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_path_resolves_to_same_id() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let resolver = PathResolver::new(tmp.path().join("paths.json"));
        let id1 = resolver.resolve(tmp.path()).await.expect("resolve");
        let id2 = resolver.resolve(tmp.path()).await.expect("resolve");
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn different_paths_resolve_to_different_ids() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let sub = tmp.path().join("sub");
        tokio::fs::create_dir_all(&sub).await.expect("mkdir");
        let resolver = PathResolver::new(tmp.path().join("paths.json"));
        let id1 = resolver.resolve(tmp.path()).await.expect("resolve");
        let id2 = resolver.resolve(&sub).await.expect("resolve");
        assert_ne!(id1, id2);
    }

    #[tokio::test]
    async fn persists_and_reloads() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let state_path = tmp.path().join("paths.json");
        let resolver = PathResolver::new(state_path.clone());
        let id1 = resolver.resolve(tmp.path()).await.expect("resolve");

        let second = PathResolver::new(state_path);
        second.load().await.expect("load");
        let id2 = second.resolve(tmp.path()).await.expect("resolve");
        assert_eq!(id1, id2);
    }
}
