use axum::{extract::State, response::IntoResponse, Json};

use crate::AppState;

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "account": state.dispatcher.ledger().account_address(),
        "tools": state.dispatcher.list_tools().len(),
    }))
}
