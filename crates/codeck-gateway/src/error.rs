//! Gateway error types and their HTTP/WS wire representation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use codeck_core::error::{CodeckError, ErrorBody};

/// Errors the gateway's own plumbing can raise, distinct from the
/// component errors (auth/pty/scheduler/memory/indexer) it wraps into
/// [`CodeckError`] at the boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No valid session/ticket/token was presented.
    #[error("unauthorized")]
    Unauthorized,

    /// Malformed request body or parameters.
    #[error("{0}")]
    BadRequest(String),

    /// The WS `Origin` header failed validation.
    #[error("origin not allowed: {0}")]
    OriginRejected(String),

    /// A wrapped component error.
    #[error(transparent)]
    Component(#[from] CodeckError),
}

/// Result type for gateway handlers.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    fn status_and_body(&self) -> (StatusCode, ErrorBody) {
        match self {
            GatewayError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    error: "unauthorized".to_string(),
                    hint: None,
                },
            ),
            GatewayError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "validation".to_string(),
                    hint: Some(msg.clone()),
                },
            ),
            GatewayError::OriginRejected(origin) => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    error: "origin_rejected".to_string(),
                    hint: Some(origin.clone()),
                },
            ),
            GatewayError::Component(e) => {
                let status =
                    StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, ErrorBody::from(e))
            }
        }
    }
}

impl From<codeck_pty::error::PtyError> for GatewayError {
    fn from(e: codeck_pty::error::PtyError) -> Self {
        use codeck_pty::error::PtyError;
        match e {
            PtyError::SessionNotFound(id) => GatewayError::Component(CodeckError::NotFound(id.to_string())),
            PtyError::InvalidCwd(_) | PtyError::InvalidDimensions { .. } | PtyError::NoTranscriptToResume(_) => {
                GatewayError::Component(CodeckError::Validation(e.to_string()))
            }
            PtyError::TooManySessions(_) => GatewayError::Component(CodeckError::Conflict(e.to_string())),
            other => GatewayError::Component(CodeckError::Fatal(other.to_string())),
        }
    }
}

impl From<codeck_scheduler::error::SchedulerError> for GatewayError {
    fn from(e: codeck_scheduler::error::SchedulerError) -> Self {
        use codeck_scheduler::error::SchedulerError;
        match e {
            SchedulerError::AgentNotFound(id) => GatewayError::Component(CodeckError::NotFound(id)),
            SchedulerError::InvalidCron(_, _) => GatewayError::Component(CodeckError::Validation(e.to_string())),
            SchedulerError::Disarmed(_) => GatewayError::Component(CodeckError::Conflict(e.to_string())),
            other => GatewayError::Component(CodeckError::Fatal(other.to_string())),
        }
    }
}

impl From<codeck_auth::error::AuthError> for GatewayError {
    fn from(e: codeck_auth::error::AuthError) -> Self {
        use codeck_auth::error::AuthError;
        match e {
            AuthError::AlreadyConfigured => GatewayError::Component(CodeckError::Conflict(e.to_string())),
            AuthError::InvalidCredentials | AuthError::SessionNotFound => GatewayError::Unauthorized,
            AuthError::RateLimited { retry_after_secs } => {
                GatewayError::Component(CodeckError::RateLimited { retry_after_secs })
            }
            other => GatewayError::Component(CodeckError::Fatal(other.to_string())),
        }
    }
}

impl From<codeck_indexer::error::IndexError> for GatewayError {
    fn from(e: codeck_indexer::error::IndexError) -> Self {
        use codeck_indexer::error::IndexError;
        match e {
            IndexError::NotFound(what) => GatewayError::Component(CodeckError::NotFound(what)),
            other => GatewayError::Component(CodeckError::Fatal(other.to_string())),
        }
    }
}

impl From<codeck_memory::error::MemoryError> for GatewayError {
    fn from(e: codeck_memory::error::MemoryError) -> Self {
        use codeck_memory::error::MemoryError;
        match e {
            MemoryError::PathIdCollision { .. } => GatewayError::Component(CodeckError::Conflict(e.to_string())),
            other => GatewayError::Component(CodeckError::Fatal(other.to_string())),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status == StatusCode::UNAUTHORIZED {
            return (
                status,
                Json(serde_json::json!({ "needsAuth": true, "error": body.error })),
            )
                .into_response();
        }
        (status, Json(body)).into_response()
    }
}
