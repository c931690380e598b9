//! Resolve a WebSocket upgrade's identity: one-time ticket, session
//! token, or (internal channel only) the gateway-proxy shared secret.

use subtle::ConstantTimeEq;

use codeck_auth::session::SessionData;

use crate::state::SharedState;

/// The outcome of authenticating a WS upgrade.
pub enum WsAuth {
    /// A regular operator, tied to a session.
    Session(SessionData),
    /// The trusted daemon, authenticated by shared secret rather than a
    /// session. Only valid on the internal PTY channel.
    Internal,
}

/// Resolve the operator-facing `/ws` connection's identity: a one-time
/// ticket (preferred, consumed on use), a session token, or the internal
/// shared secret for the trusted daemon's own connection.
pub async fn resolve_operator_auth(
    state: &SharedState,
    ticket: Option<&str>,
    token: Option<&str>,
    internal_secret: Option<&str>,
) -> Option<WsAuth> {
    if let Some(secret) = internal_secret {
        if is_valid_internal_secret(state, secret) {
            return Some(WsAuth::Internal);
        }
    }
    if let Some(ticket) = ticket {
        if let Some(session) = state.auth.consume_ws_ticket(ticket) {
            return Some(WsAuth::Session(session));
        }
    }
    if let Some(token) = token {
        if let Some(session) = state.auth.session_for_token(token).await {
            return Some(WsAuth::Session(session));
        }
    }
    None
}

/// Resolve the internal per-session PTY channel's identity: shared
/// secret only, since this channel is daemon-to-runtime, never client
/// facing.
pub fn resolve_internal_auth(state: &SharedState, internal_secret: Option<&str>) -> bool {
    internal_secret.is_some_and(|secret| is_valid_internal_secret(state, secret))
}

fn is_valid_internal_secret(state: &SharedState, provided: &str) -> bool {
    state.config.internal_shared_secret.as_deref().is_some_and(|configured| {
        configured.len() == provided.len()
            && bool::from(configured.as_bytes().ct_eq(provided.as_bytes()))
    })
}
