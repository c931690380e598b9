//! `/api/memory/*`: read, append, and flush the daily-log memory store.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use codeck_memory::store::Scope;

use crate::error::GatewayResult;
use crate::state::SharedState;

fn resolve_scope(path_id: Option<String>) -> Scope {
    match path_id {
        Some(id) => Scope::Path(id),
        None => Scope::Global,
    }
}

#[derive(Debug, Deserialize)]
pub struct ReadQuery {
    #[serde(rename = "pathId")]
    path_id: Option<String>,
    #[serde(default = "default_days")]
    days: usize,
}

fn default_days() -> usize {
    3
}

#[derive(Debug, Serialize)]
pub struct ReadResponse {
    markdown: String,
}

/// `GET /api/memory/read?pathId=&days=`.
pub async fn read(
    State(state): State<SharedState>,
    Query(query): Query<ReadQuery>,
) -> GatewayResult<Json<ReadResponse>> {
    let markdown = state.memory.read_recent(&resolve_scope(query.path_id), query.days).await?;
    Ok(Json(ReadResponse { markdown }))
}

#[derive(Debug, Deserialize)]
pub struct AppendRequest {
    #[serde(rename = "pathId")]
    path_id: Option<String>,
    markdown: String,
}

/// `POST /api/memory/append {pathId?,markdown}`.
pub async fn append(State(state): State<SharedState>, Json(req): Json<AppendRequest>) -> GatewayResult<()> {
    state.memory.append_daily(&resolve_scope(req.path_id), &req.markdown).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct FlushRequest {
    #[serde(rename = "pathId")]
    path_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FlushResponse {
    ok: bool,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

/// `POST /api/memory/flush {pathId?}`.
pub async fn flush(State(state): State<SharedState>, Json(req): Json<FlushRequest>) -> Json<FlushResponse> {
    match state.memory.flush(&resolve_scope(req.path_id)).await {
        Ok(()) => Json(FlushResponse { ok: true, retry_after: None }),
        Err(remaining) => Json(FlushResponse { ok: false, retry_after: Some(remaining) }),
    }
}
