use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use edgeplane_control::ControlError;
use std::sync::Arc;
use tracing::{debug, error, info};
use utoipa::OpenApi;

use crate::models::*;
use crate::{ApiDoc, AppState};

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a control-plane error onto a status code and error body
pub(crate) fn error_response(e: ControlError) -> ApiError {
    let (status, code) = match &e {
        ControlError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
        ControlError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ControlError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        ControlError::Dns(_) | ControlError::Database(_) => {
            error!(error = %e, "Request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            code: Some(code.to_string()),
        }),
    )
}

/// Current configuration version
#[utoipa::path(
    get,
    path = "/api/agent/config-version",
    responses(
        (status = 200, description = "Current version", body = ConfigVersionResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "agent"
)]
pub async fn config_version(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConfigVersionResponse>, ApiError> {
    let version = state.agent.config_version().await.map_err(error_response)?;
    Ok(Json(ConfigVersionResponse { version }))
}

/// Full configuration snapshot
#[utoipa::path(
    get,
    path = "/api/agent/config",
    responses(
        (status = 200, description = "Configuration snapshot", body = AgentConfigResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "agent"
)]
pub async fn agent_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AgentConfigResponse>, ApiError> {
    let config = state.agent.config().await.map_err(error_response)?;
    debug!(version = config.version, "Serving agent config");
    Ok(Json(config.into()))
}

/// Pending tasks of a node
#[utoipa::path(
    get,
    path = "/api/agent/tasks",
    params(TaskQuery),
    responses(
        (status = 200, description = "Pending tasks, oldest first", body = AgentTaskList),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "agent"
)]
pub async fn pending_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<AgentTaskList>, ApiError> {
    let tasks: Vec<AgentTask> = state
        .agent
        .pending_tasks(query.node_id)
        .await
        .map_err(error_response)?
        .into_iter()
        .map(Into::into)
        .collect();
    let total = tasks.len();

    Ok(Json(AgentTaskList { tasks, total }))
}

/// Report task progress
#[utoipa::path(
    post,
    path = "/api/agent/tasks/{id}/status",
    params(
        ("id" = i32, Path, description = "Task ID")
    ),
    request_body = UpdateTaskStatusRequest,
    responses(
        (status = 200, description = "Updated task", body = AgentTask),
        (status = 400, description = "Unknown status", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "agent"
)]
pub async fn update_task_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateTaskStatusRequest>,
) -> Result<Json<AgentTask>, ApiError> {
    let task = state
        .agent
        .update_task_status(id, &request.status, request.last_error)
        .await
        .map_err(error_response)?;

    info!(task_id = id, status = %request.status, "Agent task status updated");
    Ok(Json(task.into()))
}

/// Certificate and key of a bound certificate
#[utoipa::path(
    get,
    path = "/api/agent/certificates/{id}",
    params(
        ("id" = i32, Path, description = "Certificate ID")
    ),
    responses(
        (status = 200, description = "Certificate bundle", body = Certificate),
        (status = 404, description = "Certificate not found or not bound", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "agent"
)]
pub async fn certificate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<Certificate>, ApiError> {
    let bundle = state.agent.certificate(id).await.map_err(error_response)?;
    Ok(Json(bundle.into()))
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 500, description = "Database unreachable", body = ErrorResponse)
    ),
    tag = "system"
)]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let config_version = state.agent.config_version().await.map_err(error_response)?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        config_version,
    }))
}

/// OpenAPI document
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
