//! `/api/auth/*`: password setup/status/login/logout.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth_middleware::session_of;
use crate::error::{GatewayError, GatewayResult};
use crate::proxy_ip::source_ip;
use crate::state::SharedState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Serialize)]
pub struct AuthStatus {
    configured: bool,
}

/// `GET /api/auth/status`.
pub async fn status(State(state): State<SharedState>) -> GatewayResult<Json<AuthStatus>> {
    let configured = state.auth.is_configured().await?;
    Ok(Json(AuthStatus { configured }))
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    token: String,
}

/// `POST /api/auth/setup {password}`.
pub async fn setup(
    State(state): State<SharedState>,
    headers: HeaderMap,
    axum::extract::ConnectInfo(socket): axum::extract::ConnectInfo<std::net::SocketAddr>,
    Json(req): Json<PasswordRequest>,
) -> Response {
    if req.password.len() < MIN_PASSWORD_LEN {
        return GatewayError::BadRequest(format!("password must be at least {MIN_PASSWORD_LEN} characters"))
            .into_response();
    }
    if let Err(e) = state.auth.setup_password(&req.password).await {
        return GatewayError::from(e).into_response();
    }

    let ip = source_ip(&headers, socket.ip(), state.config.trust_proxy_headers);
    match state.auth.verify_password(&req.password, ip).await {
        Ok((token, _)) => Json(TokenResponse { token }).into_response(),
        Err(e) => GatewayError::from(e).into_response(),
    }
}

/// `POST /api/auth/login {password}`.
pub async fn login(
    State(state): State<SharedState>,
    headers: HeaderMap,
    axum::extract::ConnectInfo(socket): axum::extract::ConnectInfo<std::net::SocketAddr>,
    Json(req): Json<PasswordRequest>,
) -> Response {
    let ip = source_ip(&headers, socket.ip(), state.config.trust_proxy_headers);
    match state.auth.verify_password(&req.password, ip).await {
        Ok((token, _)) => Json(TokenResponse { token }).into_response(),
        Err(codeck_auth::error::AuthError::RateLimited { retry_after_secs }) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "retryAfter": retry_after_secs })),
        )
            .into_response(),
        Err(e) => GatewayError::from(e).into_response(),
    }
}

/// `POST /api/auth/logout` (protected: requires a session).
pub async fn logout(State(state): State<SharedState>, req: axum::extract::Request) -> GatewayResult<StatusCode> {
    let Some(session) = session_of(&req) else {
        return Err(GatewayError::Unauthorized);
    };
    state.auth.revoke_session(&session.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
