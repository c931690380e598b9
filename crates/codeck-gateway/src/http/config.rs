//! `GET /api/config`: resolved configuration for operator diagnostics.

use axum::extract::State;
use axum::Json;

use crate::state::SharedState;

const REDACTED: &str = "***redacted***";

/// `GET /api/config` (protected).
///
/// Returns the fully merged, validated configuration plus per-field
/// provenance, with secrets redacted.
pub async fn show(State(state): State<SharedState>) -> Json<codeck_config::ResolvedConfig> {
    let mut resolved = state.resolved_config.clone();
    if resolved.values.gateway.internal_shared_secret.is_some() {
        resolved.values.gateway.internal_shared_secret = Some(REDACTED.to_string());
    }
    if resolved.values.indexer.embedding_api_key.is_some() {
        resolved.values.indexer.embedding_api_key = Some(REDACTED.to_string());
    }
    Json(resolved)
}
