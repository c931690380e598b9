//! `/api/index/*`: full-text search and index maintenance.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use codeck_indexer::store::SearchHit;

use crate::error::GatewayResult;
use crate::state::SharedState;

fn default_limit() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    hits: Vec<SearchHit>,
}

/// `GET /api/index/search?q=&limit=`.
pub async fn search(
    State(state): State<SharedState>,
    Query(query): Query<SearchQuery>,
) -> GatewayResult<Json<SearchResponse>> {
    let hits = state.indexer.query(query.q, query.limit).await?;
    Ok(Json(SearchResponse { hits }))
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    indexed: usize,
}

/// `POST /api/index/sweep`: full re-index of `memory/` and `sessions/`.
pub async fn sweep(State(state): State<SharedState>) -> GatewayResult<Json<SweepResponse>> {
    let indexed = state.indexer.full_sweep().await?;
    Ok(Json(SweepResponse { indexed }))
}

/// `POST /api/index/optimize`: compacts the full-text index.
pub async fn optimize(State(state): State<SharedState>) -> GatewayResult<()> {
    state.indexer.optimize().await?;
    Ok(())
}
