//! Daily log and decision-record storage: global and per-path scopes,
//! with a debounced manual flush.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use codeck_core::atomic::{write_atomic, ActiveWriteGuard};
use codeck_core::dirs::CodeckWorkspace;

use crate::error::MemoryResult;
use crate::paths::PathResolver;
use crate::sanitize::sanitize;

const FLUSH_COOLDOWN: chrono::Duration = chrono::Duration::seconds(30);

/// A daily-log/decisions scope: either the global memory tree or a single
/// resolved `pathId`'s subtree.
#[derive(Debug, Clone)]
pub enum Scope {
    /// `.codeck/memory/`.
    Global,
    /// `.codeck/memory/paths/<pathId>/`.
    Path(String),
}

/// Appends summaries and manual flushes to daily markdown logs, global or
/// per-path, rate-limiting manual flushes to once per 30s per scope.
pub struct MemoryStore {
    workspace: CodeckWorkspace,
    guard: ActiveWriteGuard,
    last_flush: Mutex<HashMap<String, chrono::DateTime<Utc>>>,
    paths: PathResolver,
}

impl MemoryStore {
    /// Construct a store rooted at `workspace`.
    #[must_use]
    pub fn new(workspace: CodeckWorkspace) -> Self {
        let paths = PathResolver::new(workspace.paths_state_file());
        Self {
            workspace,
            guard: ActiveWriteGuard::new(),
            last_flush: Mutex::new(HashMap::new()),
            paths,
        }
    }

    /// Load the persisted cwd→`pathId` mapping, if any exists from a
    /// prior process.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping file exists but cannot be parsed.
    pub async fn load(&self) -> MemoryResult<()> {
        self.paths.load().await
    }

    /// Resolve `cwd` to its stable `pathId`, assigning one on first sight
    /// and persisting the mapping.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::MemoryError::PathIdCollision`] if the
    /// computed id already belongs to a different canonical path.
    pub async fn resolve_path_id(&self, cwd: &std::path::Path) -> MemoryResult<String> {
        self.paths.resolve(cwd).await
    }

    fn daily_dir(&self, scope: &Scope) -> PathBuf {
        match scope {
            Scope::Global => self.workspace.memory_daily_dir(),
            Scope::Path(id) => self.workspace.memory_path_scope_dir(id).join("daily"),
        }
    }

    fn scope_key(scope: &Scope) -> String {
        match scope {
            Scope::Global => "global".to_string(),
            Scope::Path(id) => format!("path:{id}"),
        }
    }

    fn today_file(&self, scope: &Scope) -> PathBuf {
        self.daily_dir(scope)
            .join(format!("{}.md", Utc::now().format("%Y-%m-%d")))
    }

    /// Append `markdown` (already sanitised by the caller, or sanitised
    /// here defensively) to today's daily log for `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error if the atomic append fails.
    pub async fn append_daily(&self, scope: &Scope, markdown: &str) -> MemoryResult<()> {
        let path = self.today_file(scope);
        let existing = tokio::fs::read_to_string(&path).await.unwrap_or_default();
        let mut combined = existing;
        combined.push_str(&sanitize(markdown));
        combined.push('\n');
        write_atomic(&self.guard, &path, combined.as_bytes()).await?;
        Ok(())
    }

    /// Append a session summary to both the global daily log and the
    /// session's path-scoped daily log.
    ///
    /// # Errors
    ///
    /// Returns an error if either append fails.
    pub async fn append_session_summary(
        &self,
        path_id: &str,
        markdown: &str,
    ) -> MemoryResult<()> {
        self.append_daily(&Scope::Global, markdown).await?;
        self.append_daily(&Scope::Path(path_id.to_string()), markdown)
            .await?;
        Ok(())
    }

    /// Read the most recent `days` daily logs for `scope`, concatenated in
    /// chronological order. Missing or unreadable files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the daily directory cannot be listed.
    pub async fn read_recent(&self, scope: &Scope, days: usize) -> MemoryResult<String> {
        let dir = self.daily_dir(scope);
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".md") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        let recent = names.iter().rev().take(days).rev();

        let mut combined = String::new();
        for name in recent {
            if let Ok(contents) = tokio::fs::read_to_string(dir.join(name)).await {
                combined.push_str(&format!("## {name}\n\n"));
                combined.push_str(&contents);
                combined.push('\n');
            }
        }
        Ok(combined)
    }

    /// Manually flush: appends a `flush`-tagged line to today's daily log
    /// for `scope`, rate-limited to once per 30s. Returns `Err` with the
    /// remaining cooldown in seconds if called too soon.
    pub async fn flush(&self, scope: &Scope) -> Result<(), u64> {
        let key = Self::scope_key(scope);
        let now = Utc::now();
        {
            let mut last = self.last_flush.lock().await;
            if let Some(prev) = last.get(&key) {
                let elapsed = now - *prev;
                if elapsed < FLUSH_COOLDOWN {
                    return Err((FLUSH_COOLDOWN - elapsed).num_seconds().max(1) as u64);
                }
            }
            last.insert(key, now);
        }
        let markdown = format!("- `flush` manual checkpoint at {}\n", now.to_rfc3339());
        self.append_daily(scope, &markdown)
            .await
            .map_err(|_| 0)?;
        Ok(())
    }
}

/// Shared handle for components that need to append summaries (PTY
/// manager on session destroy) without owning the store.
pub type SharedMemoryStore = Arc<MemoryStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_creates_daily_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ws = CodeckWorkspace::from_path(tmp.path().join(".codeck"));
        ws.ensure().expect("ensure");
        let store = MemoryStore::new(ws.clone());
        store.append_daily(&Scope::Global, "hello").await.expect("append");

        let path = store.today_file(&Scope::Global);
        let contents = tokio::fs::read_to_string(&path).await.expect("read");
        assert!(contents.contains("hello"));
    }

    #[tokio::test]
    async fn append_accumulates_across_calls() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ws = CodeckWorkspace::from_path(tmp.path().join(".codeck"));
        ws.ensure().expect("ensure");
        let store = MemoryStore::new(ws.clone());
        store.append_daily(&Scope::Global, "first").await.expect("append");
        store.append_daily(&Scope::Global, "second").await.expect("append");

        let contents = tokio::fs::read_to_string(store.today_file(&Scope::Global))
            .await
            .expect("read");
        assert!(contents.contains("first"));
        assert!(contents.contains("second"));
    }

    #[tokio::test]
    async fn flush_is_rate_limited() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ws = CodeckWorkspace::from_path(tmp.path().join(".codeck"));
        ws.ensure().expect("ensure");
        let store = MemoryStore::new(ws);
        store.flush(&Scope::Global).await.expect("first flush");
        let err = store.flush(&Scope::Global).await.unwrap_err();
        assert!(err > 0);
    }

    #[tokio::test]
    async fn flush_scopes_are_independent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ws = CodeckWorkspace::from_path(tmp.path().join(".codeck"));
        ws.ensure().expect("ensure");
        let store = MemoryStore::new(ws);
        store.flush(&Scope::Global).await.expect("global flush");
        store
            .flush(&Scope::Path("abc123456789".to_string()))
            .await
            .expect("path flush should not be rate limited by global");
    }

    #[tokio::test]
    async fn read_recent_concatenates_daily_logs() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ws = CodeckWorkspace::from_path(tmp.path().join(".codeck"));
        ws.ensure().expect("ensure");
        let store = MemoryStore::new(ws);
        store.append_daily(&Scope::Global, "today's entry").await.expect("append");

        let contents = store.read_recent(&Scope::Global, 7).await.expect("read");
        assert!(contents.contains("today's entry"));
    }

    #[tokio::test]
    async fn read_recent_on_empty_scope_returns_empty_string() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ws = CodeckWorkspace::from_path(tmp.path().join(".codeck"));
        ws.ensure().expect("ensure");
        let store = MemoryStore::new(ws);
        let contents = store.read_recent(&Scope::Global, 7).await.expect("read");
        assert!(contents.is_empty());
    }

    #[tokio::test]
    async fn secrets_are_sanitized_on_append() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ws = CodeckWorkspace::from_path(tmp.path().join(".codeck"));
        ws.ensure().expect("ensure");
        let store = MemoryStore::new(ws);
        store
            .append_daily(&Scope::Global, "api_key=sk_live_abcdefghijklmnop")
            .await
            .expect("append");
        let contents = tokio::fs::read_to_string(store.today_file(&Scope::Global))
            .await
            .expect("read");
        assert!(!contents.contains("sk_live_abcdefghijklmnop"));
    }

    #[tokio::test]
    async fn resolve_path_id_is_stable_for_the_same_cwd() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ws = CodeckWorkspace::from_path(tmp.path().join(".codeck"));
        ws.ensure().expect("ensure");
        let store = MemoryStore::new(ws);
        let id1 = store.resolve_path_id(tmp.path()).await.expect("resolve");
        let id2 = store.resolve_path_id(tmp.path()).await.expect("resolve");
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn resolve_path_id_collision_is_reported() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ws = CodeckWorkspace::from_path(tmp.path().join(".codeck"));
        ws.ensure().expect("ensure");
        let store = MemoryStore::new(ws.clone());
        let id = store.resolve_path_id(tmp.path()).await.expect("resolve");

        // Seed a fake prior claim on the same id from a different
        // canonical path, the only way to exercise a 12-hex prefix
        // collision without an actual sha256 collision.
        let persisted = serde_json::json!({ "entries": { (id.clone()): "/some/other/path" } });
        tokio::fs::write(
            ws.paths_state_file(),
            serde_json::to_vec(&persisted).unwrap(),
        )
        .await
        .unwrap();

        let reloaded = MemoryStore::new(ws);
        reloaded.load().await.expect("load");
        let err = reloaded.resolve_path_id(tmp.path()).await.unwrap_err();
        assert!(matches!(err, crate::error::MemoryError::PathIdCollision { .. }));
    }
}
