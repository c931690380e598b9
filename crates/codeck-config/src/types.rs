//! Configuration types for the codeck daemon.
//!
//! Every struct implements [`Default`] with sensible production defaults so
//! that a bare `[section]` header in TOML (or no file at all) produces a
//! working configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the codeck daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workspace root resolution.
    pub workspace: WorkspaceSection,
    /// PTY session limits and persistence.
    pub sessions: SessionsSection,
    /// Proactive agent scheduler limits.
    pub agents: AgentsSection,
    /// Memory store cooldowns and thresholds.
    pub memory: MemorySection,
    /// Indexer tuning.
    pub indexer: IndexerSection,
    /// Gateway/edge trust and rate-limit settings.
    pub gateway: GatewaySection,
    /// Logging level and format.
    pub logging: LoggingSection,
}

/// Workspace root resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSection {
    /// Overrides the directory that `.codeck/` is rooted under. When unset,
    /// the daemon uses the process's current working directory.
    pub root_override: Option<String>,
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        Self { root_override: None }
    }
}

/// PTY session limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsSection {
    /// Maximum simultaneous PTY sessions (`MAX_SESSIONS`).
    pub max_sessions: usize,
    /// Auth session TTL, in days.
    pub session_ttl_days: u64,
    /// Output ring buffer cap per session, in bytes.
    pub output_buffer_bytes: usize,
    /// Per-WS-message input size limit, in bytes.
    pub max_input_message_bytes: usize,
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            max_sessions: 5,
            session_ttl_days: 7,
            output_buffer_bytes: 1024 * 1024,
            max_input_message_bytes: 64 * 1024,
        }
    }
}

/// Proactive agent scheduler limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsSection {
    /// Maximum configured agents (`MAX_AGENTS`).
    pub max_agents: usize,
    /// Maximum retained execution records per agent (`MAX_EXECUTION_HISTORY`).
    pub max_execution_history: usize,
    /// Maximum bytes retained per execution log before truncation (`MAX_LOG_BYTES`).
    pub max_log_bytes: u64,
    /// Grace period between SIGTERM and SIGKILL on timeout, clamped to `[5, 60]`.
    pub sigkill_grace_secs: u64,
}

impl Default for AgentsSection {
    fn default() -> Self {
        Self {
            max_agents: 10,
            max_execution_history: 100,
            max_log_bytes: 50 * 1024 * 1024,
            sigkill_grace_secs: 10,
        }
    }
}

/// Memory store cooldowns and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    /// Minimum session duration, in seconds, to qualify for post-session
    /// summarisation.
    pub min_session_duration_secs: u64,
    /// Manual flush cooldown, in seconds, per scope.
    pub flush_cooldown_secs: u64,
    /// Transcript file size limit, in bytes, before capture is suppressed.
    pub transcript_max_bytes: u64,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            min_session_duration_secs: 30,
            flush_cooldown_secs: 30,
            transcript_max_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Indexer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerSection {
    /// API key for the embedding provider; enables the vector index when set.
    pub embedding_api_key: Option<String>,
    /// Filesystem-watcher debounce window, in milliseconds.
    pub watcher_debounce_ms: u64,
    /// Embedding queue drain batch size.
    pub embedding_batch_size: usize,
}

impl Default for IndexerSection {
    fn default() -> Self {
        Self {
            embedding_api_key: None,
            watcher_debounce_ms: 2000,
            embedding_batch_size: 50,
        }
    }
}

/// Gateway/edge trust and rate-limit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    /// Honour `X-Forwarded-For`/`X-Real-IP` headers from a trusted reverse
    /// proxy when deriving a request's source IP.
    pub trust_proxy_headers: bool,
    /// Shared secret accepted on `_internal` to bypass client auth for the
    /// trusted daemon in gateway-proxy mode.
    pub internal_shared_secret: Option<String>,
    /// Per-connection WS rate limit, messages per minute.
    pub rate_limit_per_minute: u32,
    /// Upstream runtime daemon URL, when this process runs as the
    /// gateway-proxy front end rather than the runtime itself.
    pub runtime_url: Option<String>,
    /// Base mDNS domain advertised for this workstation (e.g.
    /// `my-box.local`), used to accept `*.<mdns-domain>` as a valid
    /// WebSocket `Origin` alongside the server's own host.
    pub mdns_domain: Option<String>,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            trust_proxy_headers: false,
            internal_shared_secret: None,
            rate_limit_per_minute: 300,
            runtime_url: None,
            mdns_domain: None,
        }
    }
}

/// Logging level and format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base `tracing` filter directive (e.g. `"info"`).
    pub level: String,
    /// `"pretty"`, `"compact"`, or `"json"`.
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
