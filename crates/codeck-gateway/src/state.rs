//! Shared application state handed to every HTTP and WS handler.

use std::sync::Arc;
use std::time::Instant;

use codeck_auth::AuthPlane;
use codeck_config::{GatewaySection, ResolvedConfig};
use codeck_core::dirs::CodeckWorkspace;
use codeck_indexer::store::IndexStore;
use codeck_memory::store::MemoryStore;
use codeck_pty::manager::PtyManager;
use codeck_scheduler::scheduler::AgentScheduler;

use crate::rate_limit::ConnectionRateLimiter;

/// Everything a gateway handler needs, bundled behind one `Arc`-friendly
/// struct so it can be cloned cheaply into every axum handler.
pub struct AppState {
    /// Root workspace paths.
    pub workspace: CodeckWorkspace,
    /// Password/session/ticket/OAuth plane.
    pub auth: Arc<AuthPlane>,
    /// Live PTY session table.
    pub pty: Arc<PtyManager>,
    /// Cron-triggered headless agent scheduler.
    pub scheduler: Arc<AgentScheduler>,
    /// Append/search memory store.
    pub memory: Arc<MemoryStore>,
    /// Full-text (and optionally vector) search index.
    pub indexer: Arc<IndexStore>,
    /// Gateway trust/rate-limit configuration.
    pub config: GatewaySection,
    /// The fully loaded configuration plus provenance, for `/api/config`.
    pub resolved_config: ResolvedConfig,
    /// Process start time, for uptime reporting.
    pub started_at: Instant,
    /// Per-connection WS rate limiter state, keyed by connection id.
    pub ws_rate_limits: ConnectionRateLimiter,
}

impl AppState {
    /// Bundle already-constructed component handles into gateway state.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        workspace: CodeckWorkspace,
        auth: Arc<AuthPlane>,
        pty: Arc<PtyManager>,
        scheduler: Arc<AgentScheduler>,
        memory: Arc<MemoryStore>,
        indexer: Arc<IndexStore>,
        resolved_config: ResolvedConfig,
    ) -> Self {
        let config = resolved_config.values.gateway.clone();
        let rate_limit_per_minute = config.rate_limit_per_minute;
        Self {
            workspace,
            auth,
            pty,
            scheduler,
            memory,
            indexer,
            config,
            resolved_config,
            started_at: Instant::now(),
            ws_rate_limits: ConnectionRateLimiter::new(rate_limit_per_minute),
        }
    }
}

/// The shared, cloneable handle every axum route is built against.
pub type SharedState = Arc<AppState>;
