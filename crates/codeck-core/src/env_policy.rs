//! Clean-environment policy for spawned child processes (agent + shell PTYs).
//!
//! Provides a single shared blocklist so `codeck-pty` never has to maintain
//! its own inline list of secret-shaped environment variable names. Anything
//! matching is stripped before a child is spawned, then the caller's own
//! `NODE_ENV`/`PORT` stripping and the upstream OAuth env merge happen on
//! top of the result.

/// Env vars that must never be forwarded to a spawned agent or shell.
const BLOCKED_EXACT: &[&str] = &[
    "NODE_ENV",
    "PORT",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "STRIPE_SECRET_KEY",
    "STRIPE_API_KEY",
    "TWILIO_AUTH_TOKEN",
    "TWILIO_ACCOUNT_SID",
    "DATABASE_URL",
    "POSTGRES_PASSWORD",
    "MYSQL_PWD",
    "REDIS_URL",
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GITHUB_TOKEN",
];

/// Case-insensitive prefixes that are blocked entirely.
const BLOCKED_PREFIXES: &[&str] = &[
    "aws_", "stripe_", "twilio_", "azure_", "gcp_", "google_application_",
];

/// Case-insensitive substrings that mark a variable as secret-shaped even
/// when its exact name isn't known ahead of time.
const BLOCKED_SUBSTRINGS: &[&str] = &["_secret", "_api_key", "_password", "_token"];

/// Values longer than this are truncated before being forwarded (10 KiB),
/// preventing a misconfigured parent environment from handing a child an
/// unbounded blob.
pub const MAX_ENV_VALUE_BYTES: usize = 10 * 1024;

/// `true` if `key` must not be forwarded to a spawned child.
#[must_use]
pub fn is_blocked_env(key: &str) -> bool {
    if BLOCKED_EXACT.iter().any(|k| k.eq_ignore_ascii_case(key)) {
        return true;
    }
    let lower = key.to_ascii_lowercase();
    if BLOCKED_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return true;
    }
    BLOCKED_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

/// Build a clean environment map from the current process environment:
/// strips blocked keys, truncates oversized values, and returns the result
/// ready for a caller to merge OAuth credentials into.
#[must_use]
pub fn clean_env() -> std::collections::HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| !is_blocked_env(k))
        .map(|(k, mut v)| {
            if v.len() > MAX_ENV_VALUE_BYTES {
                v.truncate(MAX_ENV_VALUE_BYTES);
            }
            (k, v)
        })
        .collect()
}
