//! `/api/agents/*`: CRUD and lifecycle control for scheduled headless
//! agents.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use codeck_scheduler::types::{AgentConfig, AgentState, ObjectiveHygieneFlag};

use crate::error::{GatewayError, GatewayResult};
use crate::http::validation::{is_directory, validate_agent_name, validate_objective};
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct AgentView {
    config: AgentConfig,
    state: AgentState,
}

/// `GET /api/agents`.
pub async fn list(State(state): State<SharedState>) -> GatewayResult<Json<Vec<AgentView>>> {
    let mut out = Vec::new();
    for id in state.scheduler.list_ids() {
        let config = state.scheduler.get_config(id).await?;
        let agent_state = state.scheduler.get_state(id).await?;
        out.push(AgentView { config, state: agent_state });
    }
    Ok(Json(out))
}

/// `GET /api/agents/:id`.
pub async fn get(State(state): State<SharedState>, Path(id): Path<Uuid>) -> GatewayResult<Json<AgentView>> {
    let config = state.scheduler.get_config(id).await?;
    let agent_state = state.scheduler.get_state(id).await?;
    Ok(Json(AgentView { config, state: agent_state }))
}

fn validate_fields(name: &str, objective: &str, cwd: &std::path::Path) -> GatewayResult<()> {
    if !validate_agent_name(name) {
        return Err(GatewayError::BadRequest("name must be 1-50 characters".to_string()));
    }
    if !validate_objective(objective) {
        return Err(GatewayError::BadRequest("objective must be 1-10000 characters".to_string()));
    }
    if !is_directory(cwd) {
        return Err(GatewayError::BadRequest(format!("cwd {} is not a directory", cwd.display())));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    name: String,
    cwd: std::path::PathBuf,
    objective: String,
    #[serde(rename = "cronExpr")]
    cron_expr: String,
    #[serde(rename = "maxRetries", default = "default_max_retries")]
    max_retries: u32,
    #[serde(rename = "timeoutSecs", default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(rename = "killGraceSecs", default = "default_kill_grace_secs")]
    kill_grace_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    600
}
fn default_kill_grace_secs() -> u64 {
    10
}

#[derive(Debug, Serialize)]
pub struct CreateAgentResponse {
    id: Uuid,
    #[serde(rename = "hygieneFlags")]
    hygiene_flags: Vec<ObjectiveHygieneFlag>,
}

/// `POST /api/agents`.
pub async fn create(
    State(state): State<SharedState>,
    Json(req): Json<CreateAgentRequest>,
) -> GatewayResult<Json<CreateAgentResponse>> {
    validate_fields(&req.name, &req.objective, &req.cwd)?;
    let (id, hygiene_flags) = state
        .scheduler
        .create_agent(
            req.name,
            req.cwd,
            req.objective,
            req.cron_expr,
            req.max_retries,
            req.timeout_secs,
            req.kill_grace_secs,
        )
        .await?;
    Ok(Json(CreateAgentResponse { id, hygiene_flags }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAgentRequest {
    name: String,
    objective: String,
    #[serde(rename = "cronExpr")]
    cron_expr: String,
    #[serde(rename = "maxRetries")]
    max_retries: u32,
    #[serde(rename = "timeoutSecs")]
    timeout_secs: u64,
    #[serde(rename = "killGraceSecs")]
    kill_grace_secs: u64,
}

/// `PUT /api/agents/:id`.
pub async fn update(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAgentRequest>,
) -> GatewayResult<Json<Vec<ObjectiveHygieneFlag>>> {
    if !validate_agent_name(&req.name) {
        return Err(GatewayError::BadRequest("name must be 1-50 characters".to_string()));
    }
    if !validate_objective(&req.objective) {
        return Err(GatewayError::BadRequest("objective must be 1-10000 characters".to_string()));
    }
    let flags = state
        .scheduler
        .update_agent(
            id,
            req.name,
            req.objective,
            req.cron_expr,
            req.max_retries,
            req.timeout_secs,
            req.kill_grace_secs,
        )
        .await?;
    Ok(Json(flags))
}

/// `DELETE /api/agents/:id`.
pub async fn delete(State(state): State<SharedState>, Path(id): Path<Uuid>) -> GatewayResult<()> {
    state.scheduler.delete_agent(id).await?;
    Ok(())
}

/// `POST /api/agents/:id/pause`.
pub async fn pause(State(state): State<SharedState>, Path(id): Path<Uuid>) -> GatewayResult<()> {
    state.scheduler.set_active(id, false).await?;
    Ok(())
}

/// `POST /api/agents/:id/resume`.
pub async fn resume(State(state): State<SharedState>, Path(id): Path<Uuid>) -> GatewayResult<()> {
    state.scheduler.set_active(id, true).await?;
    Ok(())
}

/// `POST /api/agents/:id/trigger`.
pub async fn trigger(State(state): State<SharedState>, Path(id): Path<Uuid>) -> GatewayResult<()> {
    state.scheduler.trigger_now(id)?;
    Ok(())
}
