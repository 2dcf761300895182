// src/tools/envelope.rs

use serde::Serialize;
use serde_json::{json, Value};

use crate::errors::{normalize, ErrorKind, OperationError};

/// Body of a failed invocation. `original_error` carries the collaborator's
/// own text when it says something beyond the stable message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolFailure {
    pub error: bool,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_error: Option<String>,
    pub tool: String,
}

/// Result of one `dispatch`: always well-formed, whatever went wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success { tool: String, payload: Value },
    Failure(ToolFailure),
}

impl ToolOutcome {
    pub fn success(tool: impl Into<String>, payload: Value) -> Self {
        ToolOutcome::Success {
            tool: tool.into(),
            payload,
        }
    }

    pub fn failure(tool: impl Into<String>, err: &OperationError) -> Self {
        let kind = normalize(err);
        let message = kind.message().to_string();
        let original = err.to_string();
        ToolOutcome::Failure(ToolFailure {
            error: true,
            kind,
            original_error: (original != message).then_some(original),
            message,
            tool: tool.into(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutcome::Failure(_))
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ToolOutcome::Success { .. } => None,
            ToolOutcome::Failure(f) => Some(f.kind),
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            ToolOutcome::Success { payload, .. } => payload.clone(),
            ToolOutcome::Failure(f) => json!(f),
        }
    }

    /// MCP `tools/call` result: pretty JSON as text content for chat clients,
    /// plus the same value as structured content.
    pub fn to_mcp_result(&self) -> Value {
        let payload = self.payload();
        let text = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
        json!({
            "content": [{ "type": "text", "text": text }],
            "structuredContent": payload,
            "isError": self.is_error(),
        })
    }
}
