//! Component construction: opens every store, restores persisted state,
//! and spawns the background loops a running daemon needs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use codeck_auth::oauth::OAuthProviderConfig;
use codeck_auth::AuthPlane;
use codeck_config::ResolvedConfig;
use codeck_core::dirs::CodeckWorkspace;
use codeck_credstore::CredStore;
use codeck_gateway::AppState;
use codeck_indexer::store::IndexStore;
use codeck_indexer::watcher::spawn_index_watcher;
use codeck_memory::store::MemoryStore;
use codeck_pty::manager::PtyManager;
use codeck_scheduler::scheduler::AgentScheduler;

/// Every background loop spawned while wiring the daemon. Kept so shutdown
/// can abort each one rather than leaving it running past the listener.
pub struct BackgroundTasks {
    refresh_monitor: JoinHandle<()>,
    tick_loop: JoinHandle<()>,
    index_watcher: JoinHandle<()>,
}

impl BackgroundTasks {
    /// Abort every background loop. Does not wait for them to unwind;
    /// each is a plain loop with no unflushed state of its own (auth
    /// sessions, agent manifests, and the index all persist on every
    /// mutation rather than at loop exit).
    pub fn abort_all(&self) {
        self.refresh_monitor.abort();
        self.tick_loop.abort();
        self.index_watcher.abort();
    }
}

/// A fully constructed daemon: the shared gateway state plus the handles
/// needed to shut it down cleanly.
pub struct Daemon {
    /// Shared state handed to the gateway router.
    pub state: Arc<AppState>,
    /// Background loops to abort on shutdown.
    pub tasks: BackgroundTasks,
}

/// Open every store under `workspace_root` (or the configured/`CODECK_
/// WORKSPACE_ROOT`/cwd fallback), restore persisted state, and spawn the
/// refresh monitor, agent tick loop, and index watcher.
///
/// # Errors
///
/// Returns an error if any store cannot be opened, or if persisted state
/// is present but corrupt.
pub async fn build(
    workspace_root: Option<PathBuf>,
    agent_binary: String,
    oauth_config: OAuthProviderConfig,
    resolved_config: ResolvedConfig,
) -> Result<Daemon> {
    let root_override = resolved_config
        .values
        .workspace
        .root_override
        .clone()
        .map(PathBuf::from);
    let ws = CodeckWorkspace::resolve(workspace_root.or(root_override).as_deref())
        .context("resolving workspace root")?;
    ws.ensure().context("creating .codeck directory tree")?;

    let cred_store = Arc::new(
        CredStore::open(
            ws.credentials_file(),
            ws.credentials_backup_file(),
            ws.root().join("credentials.token-cache.json"),
            ws.auth_file(),
            &ws.encryption_key_file(),
        )
        .context("opening credential store")?,
    );

    let auth = Arc::new(AuthPlane::new(
        cred_store,
        ws.auth_sessions_file(),
        ws.root().join("oauth-state.json"),
        oauth_config,
    ));
    auth.restore().await.context("restoring sessions and OAuth state")?;
    let refresh_monitor = auth.spawn_refresh_monitor();

    let pty = Arc::new(PtyManager::new(ws.clone(), agent_binary.clone()));
    pty.restore_from_snapshot()
        .await
        .context("restoring PTY sessions from snapshot")?;

    let scheduler = Arc::new(AgentScheduler::new(ws.clone(), agent_binary));
    scheduler.load().await.context("loading agent manifest")?;
    let tick_loop = scheduler.spawn_tick_loop();

    let memory = Arc::new(MemoryStore::new(ws.clone()));
    memory.load().await.context("loading pathId mapping")?;

    let indexer = Arc::new(IndexStore::open(&ws).await.context("opening search index")?);
    let index_watcher = spawn_index_watcher(indexer.clone(), ws.memory_dir(), ws.sessions_dir());

    let state = Arc::new(AppState::new(
        ws,
        auth,
        pty,
        scheduler,
        memory,
        indexer,
        resolved_config,
    ));

    Ok(Daemon {
        state,
        tasks: BackgroundTasks {
            refresh_monitor,
            tick_loop,
            index_watcher,
        },
    })
}
