//! Shared error taxonomy for the codeck runtime.
//!
//! Every public-facing operation across the workspace ultimately returns (or
//! converts into) a [`CodeckError`]. Individual crates define their own
//! narrower `thiserror` enum for internal failure modes and convert it into
//! this taxonomy at the crate boundary, so callers outside a crate only ever
//! need to match on these seven kinds.

use std::fmt;

/// The error kinds an API response or WS `console:error` frame can carry.
#[derive(Debug, thiserror::Error)]
pub enum CodeckError {
    /// Malformed or out-of-range input.
    #[error("{0}")]
    Validation(String),

    /// No valid session/ticket/token was presented.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller has been locked out or throttled.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the caller may retry.
        retry_after_secs: u64,
    },

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested mutation conflicts with existing state (duplicate
    /// pathId, session limit reached, cooldown still active, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A transient failure (I/O, embedding call, token refresh) that the
    /// component's own retry policy has already given up on.
    #[error("transient failure: {0}")]
    Transient(String),

    /// An unrecoverable failure that should abort startup or the process.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl CodeckError {
    /// The HTTP status code this error kind maps to.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            CodeckError::Validation(_) => 400,
            CodeckError::Unauthorized => 401,
            CodeckError::RateLimited { .. } => 429,
            CodeckError::NotFound(_) => 404,
            CodeckError::Conflict(_) => 409,
            CodeckError::Transient(_) => 503,
            CodeckError::Fatal(_) => 500,
        }
    }

    /// A short machine-readable tag, stable across releases, suitable for
    /// the `error` field of an API response or WS error frame.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            CodeckError::Validation(_) => "validation",
            CodeckError::Unauthorized => "unauthorized",
            CodeckError::RateLimited { .. } => "rate_limited",
            CodeckError::NotFound(_) => "not_found",
            CodeckError::Conflict(_) => "conflict",
            CodeckError::Transient(_) => "transient",
            CodeckError::Fatal(_) => "fatal",
        }
    }
}

/// Wire body for an API error response: `{error, hint?}`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorBody {
    /// Machine-readable error tag.
    pub error: String,
    /// Optional human-readable or machine-actionable hint (e.g.
    /// `retryAfter` seconds encoded as a string).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<&CodeckError> for ErrorBody {
    fn from(err: &CodeckError) -> Self {
        let hint = match err {
            CodeckError::RateLimited { retry_after_secs } => {
                Some(retry_after_secs.to_string())
            }
            _ => None,
        };
        ErrorBody {
            error: err.tag().to_string(),
            hint,
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

/// Convenience alias used throughout the workspace.
pub type CodeckResult<T> = Result<T, CodeckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_kinds() {
        assert_eq!(CodeckError::Validation("x".into()).status_code(), 400);
        assert_eq!(CodeckError::Unauthorized.status_code(), 401);
        assert_eq!(
            CodeckError::RateLimited { retry_after_secs: 5 }.status_code(),
            429
        );
        assert_eq!(CodeckError::NotFound("x".into()).status_code(), 404);
        assert_eq!(CodeckError::Conflict("x".into()).status_code(), 409);
        assert_eq!(CodeckError::Transient("x".into()).status_code(), 503);
        assert_eq!(CodeckError::Fatal("x".into()).status_code(), 500);
    }

    #[test]
    fn rate_limited_carries_hint() {
        let err = CodeckError::RateLimited { retry_after_secs: 42 };
        let body = ErrorBody::from(&err);
        assert_eq!(body.error, "rate_limited");
        assert_eq!(body.hint.as_deref(), Some("42"));
    }
}
