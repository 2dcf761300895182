//! # API Module
//!
//! HTTP handlers for the server's non-stdio mode.
//!
//! ## Available Endpoints
//! - `GET /api/health` - liveness and configured account
//! - `POST /api/rpc` - MCP JSON-RPC over HTTP
//! - `GET /.well-known/agent.json` - A2A discovery document
//! - `POST /api/tasks` - start tracking a transaction as a task
//! - `GET /api/tasks/:id` - task state read through from the ledger

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub mod a2a;
pub mod health;
pub mod rpc;

pub fn router(state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(health::health_handler))
        .route("/rpc", post(rpc::rpc_handler))
        .route("/tasks", post(a2a::create_task_handler))
        .route("/tasks/:id", get(a2a::get_task_handler));

    Router::new()
        .route("/.well-known/agent.json", get(a2a::agent_json_handler))
        .nest("/api", api_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
