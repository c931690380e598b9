//! AuthPlane error types.

use thiserror::Error;

/// Errors from the authentication plane.
#[derive(Debug, Error)]
pub enum AuthError {
    /// `setup()` was called when a password is already configured.
    #[error("password already configured")]
    AlreadyConfigured,

    /// A password/session/ticket check failed.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The calling IP has exceeded the brute-force failure threshold.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the next attempt is accepted.
        retry_after_secs: u64,
    },

    /// A session token, session id, or WS ticket was not found or is
    /// expired/consumed.
    #[error("session not found or expired")]
    SessionNotFound,

    /// The PKCE state machine received an action invalid for its current
    /// state (e.g. `sendCode` while `Idle`).
    #[error("oauth flow not in progress")]
    OAuthNotInProgress,

    /// The `state` parameter returned by the provider did not match the
    /// one generated at `startLogin`.
    #[error("oauth state mismatch, possible CSRF")]
    OAuthStateMismatch,

    /// The token endpoint rejected the exchange or returned an unexpected
    /// response.
    #[error("oauth token exchange failed: {0}")]
    OAuthExchangeFailed(String),

    /// No OAuth credential is currently held, so no refresh can occur.
    #[error("no oauth credential to refresh")]
    NoCredential,

    /// A credential store operation failed.
    #[error("credential store error: {0}")]
    CredStore(#[from] codeck_credstore::CredStoreError),

    /// An HTTP call to the token endpoint failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An atomic write could not be completed.
    #[error("write failed: {0}")]
    Write(#[from] codeck_core::atomic::AtomicWriteError),
}

/// Result type for authentication-plane operations.
pub type AuthResult<T> = Result<T, AuthError>;
