//! Diagnostic view of a loaded configuration: which layer contributed which
//! value, exposed over `GET /api/config` and `codeck-daemon config show`.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::Config;

/// Where a field's effective value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigLayer {
    /// The embedded `defaults.toml`.
    Default,
    /// `/etc/codeck/config.toml`.
    System,
    /// `~/.codeck/config.toml`.
    User,
    /// `<workspace>/.codeck/config.toml`.
    Workspace,
    /// An environment variable.
    Env,
}

/// Tracks which layer last set each top-level field, keyed by dotted path
/// (e.g. `"sessions.max_sessions"`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct FieldSources {
    sources: BTreeMap<String, ConfigLayer>,
}

impl FieldSources {
    /// An empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `field` was last set by `layer`.
    pub fn record(&mut self, field: impl Into<String>, layer: ConfigLayer) {
        self.sources.insert(field.into(), layer);
    }

    /// The layer that set `field`, if tracked.
    #[must_use]
    pub fn layer_of(&self, field: &str) -> Option<ConfigLayer> {
        self.sources.get(field).copied()
    }
}

/// A fully loaded and validated configuration plus the provenance of each
/// field, for operator diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// The merged, validated configuration.
    pub values: Config,
    /// Per-field provenance.
    pub field_sources: FieldSources,
    /// Config files that were found and merged, in precedence order.
    pub loaded_files: Vec<String>,
}
