//! HTTP auth middleware: public endpoints pass through untouched; every
//! other request must carry a valid session token as a `Bearer` header or
//! `?token=` query parameter, or gets a structured 401.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use codeck_auth::session::SessionData;

use crate::state::SharedState;

/// Endpoints reachable with no session: status check, password setup, and
/// password login (the three requests a fresh client must be able to make
/// before it has a token at all), plus the WS upgrade itself, which
/// authenticates via its own ticket/token/internal-secret query parameters.
const PUBLIC_PATHS: &[&str] = &[
    "/api/auth/status",
    "/api/auth/setup",
    "/api/auth/login",
    "/ws",
];

/// Path prefix for the trusted daemon-to-runtime channel, authenticated
/// by its own shared-secret check rather than a client session.
const INTERNAL_PREFIX: &str = "/internal/";

fn bearer_or_query_token(req: &Request) -> Option<String> {
    if let Some(header) = req.headers().get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }
    req.uri().query().and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(k, _)| k == "token")
            .map(|(_, v)| v.into_owned())
    })
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "needsAuth": true })),
    )
        .into_response()
}

/// Reject requests with no valid session, except for [`PUBLIC_PATHS`] and
/// the internal channel prefix (which authenticates itself).
pub async fn require_session(
    State(state): State<SharedState>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path();
    if PUBLIC_PATHS.contains(&path) || path.starts_with(INTERNAL_PREFIX) {
        return next.run(req).await;
    }

    let Some(token) = bearer_or_query_token(&req) else {
        return unauthorized();
    };

    let Some(session) = state.auth.session_for_token(&token).await else {
        return unauthorized();
    };

    req.extensions_mut().insert(session);
    next.run(req).await
}

/// Pull the authenticated session a handler's middleware attached.
pub fn session_of(req: &Request) -> Option<&SessionData> {
    req.extensions().get::<SessionData>()
}
