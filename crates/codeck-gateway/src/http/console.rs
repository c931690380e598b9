//! `/api/console/*`: create, resize, rename, and destroy PTY sessions.

use std::path::PathBuf;
use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use codeck_pty::types::{Geometry, ResumePolicy, SessionInfo};

use crate::error::{GatewayError, GatewayResult};
use crate::http::validation::validate_session_name;
use crate::state::SharedState;

/// How long `create-shell` may block before it gives up and answers 500
/// rather than let a reverse proxy's own timeout fire first.
const CREATE_SHELL_GUARD: Duration = Duration::from_secs(10);

fn default_cwd(state: &SharedState) -> PathBuf {
    state
        .workspace
        .root()
        .parent()
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(|| state.workspace.root().to_path_buf())
}

#[derive(Debug, Serialize)]
pub struct ConsoleResponse {
    #[serde(rename = "sessionId")]
    session_id: Uuid,
    cwd: PathBuf,
    name: String,
}

impl From<SessionInfo> for ConsoleResponse {
    fn from(info: SessionInfo) -> Self {
        Self { session_id: info.id, cwd: info.cwd, name: info.display_name }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct CreateConsoleRequest {
    cwd: Option<PathBuf>,
    resume: Option<ResumeRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
enum ResumeRequest {
    Fresh,
    Continue,
    ById { id: String },
    Interactive,
}

impl From<ResumeRequest> for ResumePolicy {
    fn from(r: ResumeRequest) -> Self {
        match r {
            ResumeRequest::Fresh => ResumePolicy::Fresh,
            ResumeRequest::Continue => ResumePolicy::Continue,
            ResumeRequest::ById { id } => ResumePolicy::ResumeById(id),
            ResumeRequest::Interactive => ResumePolicy::ResumeInteractive,
        }
    }
}

/// `POST /api/console/create {cwd?,resume?}`.
pub async fn create(
    State(state): State<SharedState>,
    Json(req): Json<CreateConsoleRequest>,
) -> GatewayResult<Json<ConsoleResponse>> {
    let cwd = req.cwd.unwrap_or_else(|| default_cwd(&state));
    let resume_policy = req.resume.map(Into::into).unwrap_or(ResumePolicy::Fresh);
    let oauth_env = state.auth.oauth_env().await?;

    let canonical_cwd = tokio::fs::canonicalize(&cwd).await.unwrap_or_else(|_| cwd.clone());
    let path_id = state.memory.resolve_path_id(&canonical_cwd).await?;
    let memory_context = state
        .memory
        .read_recent(&codeck_memory::store::Scope::Path(path_id), 3)
        .await
        .unwrap_or_default();
    let memory_context = (!memory_context.is_empty()).then_some(memory_context.as_str());

    let id = state
        .pty
        .create_agent_session(cwd, resume_policy, &oauth_env, memory_context)
        .await?;
    let info = state.pty.session_info(id)?;
    Ok(Json(info.into()))
}

#[derive(Debug, Deserialize, Default)]
pub struct CreateShellRequest {
    cwd: Option<PathBuf>,
}

/// `POST /api/console/create-shell {cwd?}`.
pub async fn create_shell(
    State(state): State<SharedState>,
    Json(req): Json<CreateShellRequest>,
) -> GatewayResult<Json<ConsoleResponse>> {
    let cwd = req.cwd.unwrap_or_else(|| default_cwd(&state));
    let pty = state.pty.clone();
    let spawn_cwd = cwd.clone();
    let result = tokio::time::timeout(CREATE_SHELL_GUARD, async move { pty.create_shell_session(spawn_cwd).await })
        .await;
    let id = match result {
        Ok(inner) => inner?,
        Err(_) => {
            return Err(GatewayError::Component(codeck_core::error::CodeckError::Transient(
                "shell spawn timed out".to_string(),
            )))
        }
    };
    let info = state.pty.session_info(id)?;
    Ok(Json(info.into()))
}

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    #[serde(rename = "sessionId")]
    session_id: Uuid,
    cols: u16,
    rows: u16,
}

/// `POST /api/console/resize {sessionId,cols,rows}`.
pub async fn resize(State(state): State<SharedState>, Json(req): Json<ResizeRequest>) -> GatewayResult<()> {
    let geometry = Geometry::validate(req.cols, req.rows)?;
    state.pty.resize(req.session_id, req.session_id, geometry)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    #[serde(rename = "sessionId")]
    session_id: Uuid,
    name: String,
}

/// `POST /api/console/rename {sessionId,name}`.
pub async fn rename(State(state): State<SharedState>, Json(req): Json<RenameRequest>) -> GatewayResult<()> {
    let name = validate_session_name(&req.name)
        .ok_or_else(|| GatewayError::BadRequest("name must be 1-200 characters".to_string()))?;
    state.pty.rename(req.session_id, name).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct DestroyRequest {
    #[serde(rename = "sessionId")]
    session_id: Uuid,
}

/// `POST /api/console/destroy {sessionId}`.
pub async fn destroy(State(state): State<SharedState>, Json(req): Json<DestroyRequest>) -> GatewayResult<()> {
    state.pty.destroy(req.session_id).await?;
    Ok(())
}

/// `GET /api/console/list`.
pub async fn list(State(state): State<SharedState>) -> Json<Vec<ConsoleResponse>> {
    Json(state.pty.list_sessions().into_iter().map(Into::into).collect())
}
