//! WebSocket upgrade handlers and the frame protocols they drive.

pub mod auth;
pub mod connection;
pub mod frames;
pub mod internal;
pub mod origin;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::state::SharedState;
use crate::ws::auth::{resolve_internal_auth, resolve_operator_auth, WsAuth};

#[derive(Debug, Deserialize)]
pub struct WsUpgradeQuery {
    ticket: Option<String>,
    token: Option<String>,
    #[serde(rename = "_internal")]
    internal_secret: Option<String>,
}

/// `GET /ws`: the operator-facing multiplexed console channel.
pub async fn operator_ws_upgrade(
    State(state): State<SharedState>,
    Query(query): Query<WsUpgradeQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let request_host = headers.get("host").and_then(|v| v.to_str().ok()).unwrap_or("");
    if !origin::is_allowed(&headers, request_host, state.config.mdns_domain.as_deref()) {
        let origin = headers.get("origin").and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
        return GatewayError::OriginRejected(origin).into_response();
    }

    let auth = resolve_operator_auth(
        &state,
        query.ticket.as_deref(),
        query.token.as_deref(),
        query.internal_secret.as_deref(),
    )
    .await;

    let Some(auth) = auth else {
        return GatewayError::Unauthorized.into_response();
    };

    ws.on_upgrade(move |socket| async move {
        let connection_id = Uuid::new_v4();
        let authenticated = matches!(auth, WsAuth::Session(_) | WsAuth::Internal);
        connection::run(socket, state, connection_id, authenticated).await;
    })
}

/// `GET /internal/pty/:id`: the trusted daemon-to-runtime relay for a
/// single PTY session, bound by path rather than by per-frame id.
pub async fn internal_ws_upgrade(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<WsUpgradeQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if !resolve_internal_auth(&state, query.internal_secret.as_deref()) {
        return GatewayError::Unauthorized.into_response();
    }

    ws.on_upgrade(move |socket| async move {
        internal::run(socket, state, id).await;
    })
}
