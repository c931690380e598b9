//! The `PtyManager`: owns every live session, enforces `MAX_SESSIONS`,
//! spawns agent/shell sessions with a clean environment, wires up
//! conversation-id discovery, and persists the session snapshot on every
//! lifecycle event.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use codeck_core::dirs::CodeckWorkspace;
use codeck_core::env_policy::clean_env;
use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::discovery::spawn_discovery;
use crate::error::{PtyError, PtyResult};
use crate::session::PtySession;
use crate::snapshot::SnapshotStore;
use crate::types::{
    Geometry, PtySnapshot, ResumePolicy, SessionInfo, SessionKind, SnapshotEntry, MAX_SESSIONS,
};

/// Owns the live session table and its persisted snapshot.
pub struct PtyManager {
    sessions: DashMap<Uuid, Arc<PtySession>>,
    snapshot: SnapshotStore,
    workspace: CodeckWorkspace,
    agent_program: String,
    pending_restore: AtomicBool,
}

impl PtyManager {
    /// Build a manager rooted at `workspace`, spawning `agent_program`
    /// (e.g. the agent binary's absolute path) for agent sessions.
    #[must_use]
    pub fn new(workspace: CodeckWorkspace, agent_program: String) -> Self {
        let snapshot = SnapshotStore::new(workspace.pty_snapshot_file());
        Self {
            sessions: DashMap::new(),
            snapshot,
            workspace,
            agent_program,
            pending_restore: AtomicBool::new(false),
        }
    }

    /// `true` strictly while startup restoration is in flight.
    #[must_use]
    pub fn pending_restore(&self) -> bool {
        self.pending_restore.load(Ordering::SeqCst)
    }

    /// Count of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Spawn an agent session in `cwd` under `resume_policy`, merging
    /// `oauth_env` into the clean base environment. Takes `self` behind
    /// an `Arc` because conversation-id discovery runs as a detached task
    /// that needs to re-snapshot manager state once it resolves.
    pub async fn create_agent_session(
        self: &Arc<Self>,
        cwd: PathBuf,
        resume_policy: ResumePolicy,
        oauth_env: &HashMap<String, String>,
        memory_context: Option<&str>,
    ) -> PtyResult<Uuid> {
        if !cwd.is_dir() {
            return Err(PtyError::InvalidCwd(cwd));
        }
        self.enforce_session_cap()?;

        if let Some(context) = memory_context {
            inject_memory_context(&cwd, context).await;
        }

        let mut env = clean_env();
        for (k, v) in oauth_env {
            env.insert(k.clone(), v.clone());
        }

        let id = Uuid::new_v4();
        let display_name = display_name_for(&cwd, SessionKind::Agent);
        let args = resume_args(&resume_policy);
        let session = PtySession::spawn(
            id,
            SessionKind::Agent,
            cwd.clone(),
            display_name,
            &self.agent_program,
            &args,
            &env,
        )?;
        self.sessions.insert(id, session.clone());
        self.snapshot_now("create").await?;

        let transcript_dir = cwd.clone();
        let manager = self.clone();
        let session_for_discovery = session.clone();
        spawn_discovery(session_for_discovery, transcript_dir, resume_policy, move |conv_id| {
            tokio::spawn(async move {
                tracing::debug!(%conv_id, "conversation id discovered");
                if let Err(e) = manager.snapshot_now("discovery").await {
                    tracing::warn!(error = %e, "failed to persist snapshot after discovery");
                }
            });
        });

        Ok(id)
    }

    /// Spawn a plain `/bin/bash` shell session in `cwd`.
    pub async fn create_shell_session(&self, cwd: PathBuf) -> PtyResult<Uuid> {
        if !cwd.is_dir() {
            return Err(PtyError::InvalidCwd(cwd));
        }
        self.enforce_session_cap()?;

        let env = clean_env();
        let id = Uuid::new_v4();
        let display_name = display_name_for(&cwd, SessionKind::Shell);
        let session = PtySession::spawn(
            id,
            SessionKind::Shell,
            cwd,
            display_name,
            "/bin/bash",
            &[],
            &env,
        )?;
        self.sessions.insert(id, session);
        self.snapshot_now("create").await?;
        Ok(id)
    }

    fn enforce_session_cap(&self) -> PtyResult<()> {
        if self.sessions.len() >= MAX_SESSIONS {
            return Err(PtyError::TooManySessions(MAX_SESSIONS));
        }
        Ok(())
    }

    fn get(&self, id: Uuid) -> PtyResult<Arc<PtySession>> {
        self.sessions.get(&id).map(|e| e.clone()).ok_or(PtyError::SessionNotFound(id))
    }

    /// Attach a client to session `id`.
    pub fn attach(
        &self,
        id: Uuid,
        client_id: Uuid,
        geometry: Geometry,
    ) -> PtyResult<(Vec<u8>, broadcast::Receiver<Vec<u8>>)> {
        Ok(self.get(id)?.attach(client_id, geometry))
    }

    /// Detach a client from session `id`.
    pub fn detach(&self, id: Uuid, client_id: Uuid) -> PtyResult<()> {
        self.get(id)?.detach(client_id);
        Ok(())
    }

    /// Resize a client's view of session `id`.
    pub fn resize(&self, id: Uuid, client_id: Uuid, geometry: Geometry) -> PtyResult<()> {
        self.get(id)?.resize_client(client_id, geometry);
        Ok(())
    }

    /// Operator-facing summary of one live session.
    pub fn session_info(&self, id: Uuid) -> PtyResult<SessionInfo> {
        let session = self.get(id)?;
        Ok(SessionInfo {
            id: session.id,
            kind: session.kind,
            cwd: session.cwd.clone(),
            display_name: session.display_name.lock().expect("poisoned").clone(),
        })
    }

    /// Operator-facing summary of every live session.
    #[must_use]
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|e| {
                let s = e.value();
                SessionInfo {
                    id: s.id,
                    kind: s.kind,
                    cwd: s.cwd.clone(),
                    display_name: s.display_name.lock().expect("poisoned").clone(),
                }
            })
            .collect()
    }

    /// Watch for session `id`'s exit code.
    pub fn subscribe_exit(&self, id: Uuid) -> PtyResult<tokio::sync::watch::Receiver<Option<i32>>> {
        Ok(self.get(id)?.subscribe_exit())
    }

    /// Write input bytes to session `id`.
    pub async fn write_input(&self, id: Uuid, bytes: Vec<u8>) -> PtyResult<()> {
        self.get(id)?.write_input(bytes).await
    }

    /// Rename session `id`.
    pub async fn rename(&self, id: Uuid, name: String) -> PtyResult<()> {
        self.get(id)?.rename(name);
        self.snapshot_now("rename").await
    }

    /// Destroy session `id`: ends its lifecycle, signals the child, and
    /// re-snapshots remaining state.
    pub async fn destroy(&self, id: Uuid) -> PtyResult<()> {
        let session = self.get(id)?;
        session.destroy().await;
        self.sessions.remove(&id);
        self.snapshot_now("destroy").await
    }

    /// Destroy every session, writing exactly one final snapshot (the
    /// empty-state removal) rather than one per intermediate destroy.
    pub async fn destroy_all(&self) -> PtyResult<()> {
        let ids: Vec<Uuid> = self.sessions.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, session)) = self.sessions.remove(&id) {
                session.destroy().await;
            }
        }
        self.snapshot.save(&PtySnapshot::new(vec![])).await
    }

    /// Terminate every live session's child process for a daemon shutdown,
    /// leaving the persisted snapshot untouched so a restart resumes them
    /// via [`PtyManager::restore_from_snapshot`] instead of losing them.
    pub async fn shutdown(&self) {
        for entry in self.sessions.iter() {
            entry.value().destroy().await;
        }
    }

    async fn snapshot_now(&self, reason: &str) -> PtyResult<()> {
        let entries: Vec<SnapshotEntry> = self
            .sessions
            .iter()
            .map(|e| {
                let s = e.value();
                SnapshotEntry {
                    id: s.id,
                    kind: s.kind,
                    cwd: s.cwd.clone(),
                    display_name: s.display_name.lock().expect("poisoned").clone(),
                    reason: reason.to_string(),
                    conversation_id: s.conversation_id.lock().expect("poisoned").clone(),
                }
            })
            .collect();
        self.snapshot.save(&PtySnapshot::new(entries)).await
    }

    /// Restore sessions from a persisted snapshot at startup. Each entry
    /// with a conversation id resumes by id; otherwise the most recent
    /// genuine transcript for its cwd is used; otherwise a fresh session
    /// is started. The snapshot is renamed to `.bak` afterward so a crash
    /// mid-restore cannot loop.
    pub async fn restore_from_snapshot(self: &Arc<Self>) -> PtyResult<usize> {
        self.pending_restore.store(true, Ordering::SeqCst);
        let result = self.restore_inner().await;
        self.pending_restore.store(false, Ordering::SeqCst);
        result
    }

    async fn restore_inner(self: &Arc<Self>) -> PtyResult<usize> {
        let Some(snapshot) = self.snapshot.load().await? else {
            return Ok(0);
        };
        let mut restored = 0;
        for entry in snapshot.entries {
            let policy = match &entry.conversation_id {
                Some(id) => ResumePolicy::ResumeById(id.clone()),
                None => ResumePolicy::Continue,
            };
            let result = match entry.kind {
                SessionKind::Agent => {
                    self.create_agent_session(entry.cwd.clone(), policy, &HashMap::new(), None)
                        .await
                }
                SessionKind::Shell => self.create_shell_session(entry.cwd.clone()).await,
            };
            match result {
                Ok(_) => restored += 1,
                Err(e) => tracing::warn!(cwd = %entry.cwd.display(), error = %e, "failed to restore session"),
            }
        }
        self.snapshot.mark_restored().await?;
        Ok(restored)
    }
}

fn display_name_for(cwd: &Path, kind: SessionKind) -> String {
    let leaf = cwd.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| cwd.display().to_string());
    match kind {
        SessionKind::Agent => format!("agent:{leaf}"),
        SessionKind::Shell => format!("shell:{leaf}"),
    }
}

fn resume_args(policy: &ResumePolicy) -> Vec<String> {
    match policy {
        ResumePolicy::Fresh => vec![],
        ResumePolicy::Continue => vec!["--continue".to_string()],
        ResumePolicy::ResumeById(id) => vec!["--resume".to_string(), id.clone()],
        ResumePolicy::ResumeInteractive => vec!["--resume".to_string()],
    }
}

/// Best-effort memory-context injection: prepends `context` to a
/// well-known instruction marker file in `cwd` if one already exists.
/// Silent no-op otherwise, since an agent working directory with no
/// instruction file has nowhere meaningful to receive it.
async fn inject_memory_context(cwd: &Path, context: &str) {
    let marker = cwd.join("AGENTS.md");
    let Ok(existing) = tokio::fs::read_to_string(&marker).await else {
        return;
    };
    if existing.starts_with(context) {
        return;
    }
    let combined = format!("{context}\n\n{existing}");
    if let Err(e) = tokio::fs::write(&marker, combined).await {
        tracing::warn!(error = %e, "failed to inject memory context");
    }
}
