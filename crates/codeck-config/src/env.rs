//! Environment variable surface recognised by the daemon (§6).
//!
//! Env vars always win over file-based config; this module applies them as
//! the final layer before validation.

use crate::types::Config;

/// Apply every recognised environment variable override onto `config` in
/// place, returning the names of the variables that were actually applied
/// (for the `FieldSources` diagnostic view).
pub fn apply_env_overrides(config: &mut Config) -> Vec<&'static str> {
    let mut applied = Vec::new();

    if let Ok(v) = std::env::var("CODECK_WORKSPACE_ROOT") {
        config.workspace.root_override = Some(v);
        applied.push("CODECK_WORKSPACE_ROOT");
    }
    if let Some(v) = parse_env("CODECK_SESSION_TTL_DAYS") {
        config.sessions.session_ttl_days = v;
        applied.push("CODECK_SESSION_TTL_DAYS");
    }
    if let Some(v) = parse_env("CODECK_MAX_SESSIONS") {
        config.sessions.max_sessions = v;
        applied.push("CODECK_MAX_SESSIONS");
    }
    if let Some(v) = parse_env("CODECK_SIGKILL_GRACE_SECS") {
        config.agents.sigkill_grace_secs = v;
        applied.push("CODECK_SIGKILL_GRACE_SECS");
    }
    if let Ok(v) = std::env::var("CODECK_INTERNAL_SHARED_SECRET") {
        config.gateway.internal_shared_secret = Some(v);
        applied.push("CODECK_INTERNAL_SHARED_SECRET");
    }
    if let Ok(v) = std::env::var("CODECK_EMBEDDING_API_KEY") {
        config.indexer.embedding_api_key = Some(v);
        applied.push("CODECK_EMBEDDING_API_KEY");
    }
    if let Some(v) = parse_bool_env("CODECK_TRUST_PROXY_HEADERS") {
        config.gateway.trust_proxy_headers = v;
        applied.push("CODECK_TRUST_PROXY_HEADERS");
    }
    if let Ok(v) = std::env::var("CODECK_RUNTIME_URL") {
        config.gateway.runtime_url = Some(v);
        applied.push("CODECK_RUNTIME_URL");
    }
    if let Ok(v) = std::env::var("RUST_LOG") {
        config.logging.level = v;
        applied.push("RUST_LOG");
    }
    if let Ok(v) = std::env::var("CODECK_LOG_FORMAT") {
        config.logging.format = v;
        applied.push("CODECK_LOG_FORMAT");
    }

    applied
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn parse_bool_env(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| match v.as_str() {
        "1" | "true" | "TRUE" | "yes" => Some(true),
        "0" | "false" | "FALSE" | "no" => Some(false),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_overrides_and_reports_names() {
        std::env::set_var("CODECK_MAX_SESSIONS", "3");
        std::env::set_var("CODECK_TRUST_PROXY_HEADERS", "true");
        let mut config = Config::default();
        let applied = apply_env_overrides(&mut config);
        assert_eq!(config.sessions.max_sessions, 3);
        assert!(config.gateway.trust_proxy_headers);
        assert!(applied.contains(&"CODECK_MAX_SESSIONS"));
        assert!(applied.contains(&"CODECK_TRUST_PROXY_HEADERS"));
        std::env::remove_var("CODECK_MAX_SESSIONS");
        std::env::remove_var("CODECK_TRUST_PROXY_HEADERS");
    }

    #[test]
    fn unset_vars_leave_defaults_untouched() {
        std::env::remove_var("CODECK_MAX_SESSIONS");
        let mut config = Config::default();
        let before = config.sessions.max_sessions;
        let applied = apply_env_overrides(&mut config);
        assert_eq!(config.sessions.max_sessions, before);
        assert!(!applied.contains(&"CODECK_MAX_SESSIONS"));
    }
}
