//! Directory scaffolding for the per-workspace `.codeck/` store.
//!
//! Every persisted thing the daemon owns — credentials, sessions, memory,
//! the index, agent manifests — lives under a single root:
//!
//! ```text
//! <workspace>/.codeck/
//! ├── auth.json                     (password record, mode 0600)
//! ├── sessions.json                 (auth sessions, mode 0600, omitted when empty)
//! ├── credentials.json              (OAuth credential, encrypted-v2 or legacy plaintext)
//! ├── credentials.json.backup
//! ├── .encryption-key                (auto-created, mode 0600)
//! ├── state/
//! │   ├── sessions.json              (PTY snapshot; absent ⇔ no sessions)
//! │   ├── paths.json
//! │   └── flush_state.json
//! ├── memory/
//! │   ├── MEMORY.md
//! │   ├── daily/YYYY-MM-DD.md
//! │   ├── decisions/ADR-<date>-<slug>.md
//! │   └── paths/<pathId>/{MEMORY.md,daily/…,decisions/…}
//! ├── sessions/<uuid>.jsonl          (transcripts)
//! ├── index/memory.sqlite            (+ WAL siblings)
//! └── agents/
//!     ├── manifest.json (+ .backup)
//!     └── <id>/{config.json,state.json,executions/<ts>.{jsonl,log,result.json}}
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// Root of a single workspace's `.codeck/` store.
#[derive(Debug, Clone)]
pub struct CodeckWorkspace {
    root: PathBuf,
}

impl CodeckWorkspace {
    /// Resolve `.codeck/` under `workspace_root`, honouring the
    /// `CODECK_WORKSPACE_ROOT` override when `workspace_root` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if no workspace root can be determined.
    pub fn resolve(workspace_root: Option<&Path>) -> io::Result<Self> {
        let base = if let Some(p) = workspace_root {
            p.to_path_buf()
        } else if let Ok(over) = std::env::var("CODECK_WORKSPACE_ROOT") {
            PathBuf::from(over)
        } else {
            std::env::current_dir()?
        };
        Ok(Self::from_path(base.join(".codeck")))
    }

    /// Build directly from an explicit `.codeck/` path (tests, or an
    /// already-resolved location).
    #[must_use]
    pub fn from_path(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create every directory this workspace needs, with owner-only
    /// permissions on Unix.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be created.
    pub fn ensure(&self) -> io::Result<()> {
        for dir in [
            self.root.clone(),
            self.state_dir(),
            self.memory_dir(),
            self.memory_daily_dir(),
            self.memory_decisions_dir(),
            self.memory_paths_dir(),
            self.sessions_dir(),
            self.index_dir(),
            self.agents_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
            secure_dir(&dir)?;
        }
        Ok(())
    }

    /// `.codeck/` itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `.codeck/auth.json`.
    #[must_use]
    pub fn auth_file(&self) -> PathBuf {
        self.root.join("auth.json")
    }

    /// `.codeck/sessions.json` (auth sessions).
    #[must_use]
    pub fn auth_sessions_file(&self) -> PathBuf {
        self.root.join("sessions.json")
    }

    /// `.codeck/credentials.json`.
    #[must_use]
    pub fn credentials_file(&self) -> PathBuf {
        self.root.join("credentials.json")
    }

    /// `.codeck/credentials.json.backup`.
    #[must_use]
    pub fn credentials_backup_file(&self) -> PathBuf {
        self.root.join("credentials.json.backup")
    }

    /// `.codeck/.encryption-key`.
    #[must_use]
    pub fn encryption_key_file(&self) -> PathBuf {
        self.root.join(".encryption-key")
    }

    /// `.codeck/state/`.
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    /// `.codeck/state/sessions.json` (PTY snapshot).
    #[must_use]
    pub fn pty_snapshot_file(&self) -> PathBuf {
        self.state_dir().join("sessions.json")
    }

    /// `.codeck/state/paths.json`.
    #[must_use]
    pub fn paths_state_file(&self) -> PathBuf {
        self.state_dir().join("paths.json")
    }

    /// `.codeck/state/flush_state.json`.
    #[must_use]
    pub fn flush_state_file(&self) -> PathBuf {
        self.state_dir().join("flush_state.json")
    }

    /// `.codeck/memory/`.
    #[must_use]
    pub fn memory_dir(&self) -> PathBuf {
        self.root.join("memory")
    }

    /// `.codeck/memory/MEMORY.md`.
    #[must_use]
    pub fn memory_global_file(&self) -> PathBuf {
        self.memory_dir().join("MEMORY.md")
    }

    /// `.codeck/memory/daily/`.
    #[must_use]
    pub fn memory_daily_dir(&self) -> PathBuf {
        self.memory_dir().join("daily")
    }

    /// `.codeck/memory/decisions/`.
    #[must_use]
    pub fn memory_decisions_dir(&self) -> PathBuf {
        self.memory_dir().join("decisions")
    }

    /// `.codeck/memory/paths/`.
    #[must_use]
    pub fn memory_paths_dir(&self) -> PathBuf {
        self.memory_dir().join("paths")
    }

    /// `.codeck/memory/paths/<pathId>/`.
    #[must_use]
    pub fn memory_path_scope_dir(&self, path_id: &str) -> PathBuf {
        self.memory_paths_dir().join(path_id)
    }

    /// `.codeck/sessions/`.
    #[must_use]
    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    /// `.codeck/sessions/<uuid>.jsonl`.
    #[must_use]
    pub fn transcript_file(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(format!("{session_id}.jsonl"))
    }

    /// `.codeck/index/`.
    #[must_use]
    pub fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    /// `.codeck/index/memory.sqlite`.
    #[must_use]
    pub fn index_db_file(&self) -> PathBuf {
        self.index_dir().join("memory.sqlite")
    }

    /// `.codeck/agents/`.
    #[must_use]
    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    /// `.codeck/agents/manifest.json`.
    #[must_use]
    pub fn agents_manifest_file(&self) -> PathBuf {
        self.agents_dir().join("manifest.json")
    }

    /// `.codeck/agents/manifest.json.backup`.
    #[must_use]
    pub fn agents_manifest_backup_file(&self) -> PathBuf {
        self.agents_dir().join("manifest.json.backup")
    }

    /// `.codeck/agents/<id>/`.
    #[must_use]
    pub fn agent_dir(&self, agent_id: &str) -> PathBuf {
        self.agents_dir().join(agent_id)
    }

    /// `.codeck/agents/<id>/config.json`.
    #[must_use]
    pub fn agent_config_file(&self, agent_id: &str) -> PathBuf {
        self.agent_dir(agent_id).join("config.json")
    }

    /// `.codeck/agents/<id>/state.json`.
    #[must_use]
    pub fn agent_state_file(&self, agent_id: &str) -> PathBuf {
        self.agent_dir(agent_id).join("state.json")
    }

    /// `.codeck/agents/<id>/executions/`.
    #[must_use]
    pub fn agent_executions_dir(&self, agent_id: &str) -> PathBuf {
        self.agent_dir(agent_id).join("executions")
    }
}

/// Set owner-only permissions (`0700` for dirs, `0600` for files) on Unix;
/// a no-op elsewhere.
pub fn secure_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        std::fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set owner-only permissions (`0600`) on a file on Unix; a no-op elsewhere.
pub fn secure_file(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// `true` if `path` does not already have mode `0600` (Unix only; always
/// `false` elsewhere, since permissions aren't enforceable there).
#[must_use]
pub fn needs_tightening(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(path) {
            Ok(meta) => meta.permissions().mode() & 0o777 != 0o600,
            Err(_) => false,
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        false
    }
}
