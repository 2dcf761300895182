//! # MCP Handler Module
//!
//! Routes Model Context Protocol requests to the tool dispatcher.
//!
//! ## Methods
//! - `initialize` - server info, protocol version and capabilities
//! - `tools/list` - every registered tool with its input schema
//! - `tools/call` - runs one tool and returns its result envelope
//! - any registered tool name used directly as the method, e.g. `get_balance`
//!
//! Tool failures come back inside a successful JSON-RPC response with
//! `isError: true`. JSON-RPC errors are reserved for malformed requests.

use serde_json::{json, Value};
use tracing::info;

use crate::mcp::protocol::{error_codes, Request, Response};
use crate::AppState;

pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Main entry point for all incoming MCP requests. Notifications yield `None`.
pub async fn handle_mcp_request(req: Request, state: AppState) -> Option<Response> {
    info!("Handling MCP request for method: {}", req.method);

    if req.is_notification() {
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "tools/list" => handle_tools_list(&req, &state),
        "tools/call" => handle_tool_call(req, &state).await,
        method if state.dispatcher.list_tools().iter().any(|t| t.name == method) => {
            handle_tool_call(req.into_tool_call(), &state).await
        }
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

async fn handle_tool_call(req: Request, state: &AppState) -> Response {
    let params = match req.params.as_ref() {
        Some(p) => p,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'params' object".into(),
            )
        }
    };

    let tool_name = match params.get("name").and_then(|n| n.as_str()) {
        Some(name) => name,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'name' field in params".into(),
            )
        }
    };

    let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    let outcome = state.dispatcher.dispatch(tool_name, args).await;
    Response::success(req.id.clone(), outcome.to_mcp_result())
}

fn handle_initialize(req: &Request) -> Response {
    let server_info = json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    });
    let capabilities = json!({ "tools": { "listChanged": false } });
    let instructions = "On-chain agent toolkit: balances, transfers, contract calls, \
        aggregated swaps, deployments and ERC-8004 agent identity. Write tools return \
        only after the transaction is final.";

    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": server_info,
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": capabilities,
            "instructions": instructions
        }),
    )
}

fn handle_tools_list(req: &Request, state: &AppState) -> Response {
    let tools: Vec<Value> = state
        .dispatcher
        .list_tools()
        .iter()
        .map(|t| t.to_json())
        .collect();
    Response::success(req.id.clone(), json!({ "tools": tools }))
}
