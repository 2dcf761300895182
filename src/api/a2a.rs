use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::a2a::A2aAdapter;
use crate::errors::{ErrorKind, OperationError};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub transaction_hash: String,
    #[serde(default)]
    pub prompt: String,
}

fn error_response(err: &OperationError) -> Response {
    let kind = err.kind();
    let status = match kind {
        ErrorKind::Unconfigured => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::InvalidArguments => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    };
    let body = json!({
        "error": true,
        "kind": kind,
        "message": err.to_string(),
    });
    (status, Json(body)).into_response()
}

fn adapter(state: &AppState) -> Result<Arc<A2aAdapter>, OperationError> {
    state
        .a2a
        .clone()
        .ok_or_else(|| OperationError::unconfigured("IDENTITY_REGISTRY_ADDRESS is not configured"))
}

// GET /.well-known/agent.json
pub async fn agent_json_handler(State(state): State<AppState>) -> Response {
    let result = async {
        let adapter = adapter(&state)?;
        let agent_id = state
            .config
            .a2a_agent_id
            .as_deref()
            .ok_or_else(|| OperationError::unconfigured("A2A_AGENT_ID is not configured"))?;
        let doc = adapter
            .well_known_agent_json(agent_id, &state.config.public_base_url)
            .await?;
        Ok::<_, OperationError>(doc)
    }
    .await;

    match result {
        Ok(doc) => Json(doc).into_response(),
        Err(e) => {
            warn!("Failed to build agent card: {}", e);
            error_response(&e)
        }
    }
}

// GET /api/tasks/:id
pub async fn get_task_handler(
    Path(task_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match adapter(&state) {
        Ok(adapter) => Json(adapter.task_status(&task_id).await).into_response(),
        Err(e) => error_response(&e),
    }
}

// POST /api/tasks
pub async fn create_task_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Response {
    let adapter = match adapter(&state) {
        Ok(adapter) => adapter,
        Err(e) => return error_response(&e),
    };
    if !req.transaction_hash.starts_with("0x") {
        return error_response(&OperationError::invalid_arguments(
            "transactionHash must be 0x-prefixed",
        ));
    }
    let task = adapter.task_from_transaction(&req.transaction_hash, &req.prompt);
    info!("Tracking task {}", task.id);
    (StatusCode::CREATED, Json(task)).into_response()
}
