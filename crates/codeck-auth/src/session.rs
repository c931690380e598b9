//! Session storage: random tokens, a secondary session-id index, and
//! debounced `lastSeen` persistence.
//!
//! In-memory state is authoritative; the on-disk copy is a best-effort
//! mirror used only to survive a restart.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use codeck_core::atomic::{remove_if_present, write_atomic, ActiveWriteGuard};

use crate::error::AuthResult;

const LAST_SEEN_DEBOUNCE: chrono::Duration = chrono::Duration::seconds(60);

/// Default session lifetime: 7 days.
pub const DEFAULT_SESSION_TTL: chrono::Duration = chrono::Duration::days(7);

/// A single authenticated session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// Stable session identifier, distinct from the bearer token.
    pub session_id: String,
    /// Client IP the session was created from.
    pub created_from_ip: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session stops being valid.
    pub expires_at: DateTime<Utc>,
    /// Last time this session was used, debounced to avoid a disk write
    /// per request.
    pub last_seen: DateTime<Utc>,
}

#[derive(Default, Serialize, Deserialize)]
struct PersistedSessions {
    #[serde(default)]
    sessions: HashMap<String, SessionData>,
}

struct Inner {
    /// token -> session data.
    by_token: HashMap<String, SessionData>,
    /// sessionId -> token, for O(1) revoke-by-id.
    by_id: HashMap<String, String>,
}

/// In-memory session store with best-effort atomic persistence.
pub struct SessionStore {
    inner: RwLock<Inner>,
    path: PathBuf,
    guard: ActiveWriteGuard,
}

impl SessionStore {
    /// Create an empty store rooted at `path` (no sessions are loaded;
    /// call [`SessionStore::load`] separately).
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            inner: RwLock::new(Inner {
                by_token: HashMap::new(),
                by_id: HashMap::new(),
            }),
            path,
            guard: ActiveWriteGuard::new(),
        }
    }

    /// Load persisted sessions from disk, dropping any already expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub async fn load(&self) -> AuthResult<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let bytes = tokio::fs::read(&self.path).await?;
        let persisted: PersistedSessions = serde_json::from_slice(&bytes)?;
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        for (token, data) in persisted.sessions {
            if data.expires_at > now {
                inner.by_id.insert(data.session_id.clone(), token.clone());
                inner.by_token.insert(token, data);
            }
        }
        Ok(())
    }

    /// Mint and store a new session for `ip`, with the given TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the new session fails.
    pub async fn create(&self, ip: &str, ttl: chrono::Duration) -> AuthResult<(String, SessionData)> {
        let token = random_token();
        let session_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let data = SessionData {
            session_id: session_id.clone(),
            created_from_ip: ip.to_string(),
            created_at: now,
            expires_at: now + ttl,
            last_seen: now,
        };

        {
            let mut inner = self.inner.write().await;
            inner.by_id.insert(session_id, token.clone());
            inner.by_token.insert(token.clone(), data.clone());
        }
        self.persist().await?;
        Ok((token, data))
    }

    /// Look up a live (non-expired) session by bearer token, debounce-
    /// updating `last_seen` if more than 60s has passed.
    pub async fn get_by_token(&self, token: &str) -> Option<SessionData> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let data = inner.by_token.get_mut(token)?;
        if data.expires_at <= now {
            let session_id = data.session_id.clone();
            inner.by_token.remove(token);
            inner.by_id.remove(&session_id);
            return None;
        }
        if now - data.last_seen >= LAST_SEEN_DEBOUNCE {
            data.last_seen = now;
        }
        Some(data.clone())
    }

    /// Revoke a session by its id. No-op if unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the removal fails.
    pub async fn revoke_by_id(&self, session_id: &str) -> AuthResult<()> {
        {
            let mut inner = self.inner.write().await;
            if let Some(token) = inner.by_id.remove(session_id) {
                inner.by_token.remove(&token);
            }
        }
        self.persist().await
    }

    /// Number of live sessions currently held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_token.len()
    }

    /// `true` if no sessions are currently held.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn persist(&self) -> AuthResult<()> {
        let inner = self.inner.read().await;
        if inner.by_token.is_empty() {
            drop(inner);
            remove_if_present(&self.path).await?;
            return Ok(());
        }
        let persisted = PersistedSessions {
            sessions: inner.by_token.clone(),
        };
        drop(inner);
        let bytes = serde_json::to_vec_pretty(&persisted)?;
        write_atomic(&self.guard, &self.path, &bytes).await?;
        Ok(())
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_lookup_by_token() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(tmp.path().join("sessions.json"));
        let (token, data) = store.create("127.0.0.1", DEFAULT_SESSION_TTL).await.expect("create");
        let looked_up = store.get_by_token(&token).await.expect("present");
        assert_eq!(looked_up.session_id, data.session_id);
    }

    #[tokio::test]
    async fn expired_session_is_not_returned() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(tmp.path().join("sessions.json"));
        let (token, _) = store.create("127.0.0.1", chrono::Duration::seconds(-1)).await.expect("create");
        assert!(store.get_by_token(&token).await.is_none());
    }

    #[tokio::test]
    async fn revoke_by_id_removes_token_lookup() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(tmp.path().join("sessions.json"));
        let (token, data) = store.create("127.0.0.1", DEFAULT_SESSION_TTL).await.expect("create");
        store.revoke_by_id(&data.session_id).await.expect("revoke");
        assert!(store.get_by_token(&token).await.is_none());
    }

    #[tokio::test]
    async fn persists_and_reloads_across_instances() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("sessions.json");
        let store = SessionStore::new(path.clone());
        let (token, _) = store.create("127.0.0.1", DEFAULT_SESSION_TTL).await.expect("create");

        let second = SessionStore::new(path);
        second.load().await.expect("load");
        assert!(second.get_by_token(&token).await.is_some());
    }

    #[tokio::test]
    async fn empty_store_removes_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("sessions.json");
        let store = SessionStore::new(path.clone());
        let (_, data) = store.create("127.0.0.1", DEFAULT_SESSION_TTL).await.expect("create");
        store.revoke_by_id(&data.session_id).await.expect("revoke");
        assert!(!path.exists());
    }
}
