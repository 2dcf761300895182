// src/mcp/protocol.rs

//! JSON-RPC 2.0 envelopes shared by the stdio and HTTP transports.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
}

fn default_jsonrpc() -> String {
    "2.0".to_string()
}

impl Request {
    /// Requests without an id are notifications and get no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_null()
    }

    /// Rewrites a direct tool-name method (`"get_balance"`) into the
    /// equivalent `tools/call` request.
    pub fn into_tool_call(self) -> Request {
        let arguments = self.params.unwrap_or_else(|| Value::Object(Default::default()));
        Request {
            jsonrpc: self.jsonrpc,
            id: self.id,
            params: Some(serde_json::json!({
                "name": self.method,
                "arguments": arguments,
            })),
            method: "tools/call".to_string(),
        }
    }
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(ErrorObject { code, message }),
        }
    }
}

// Standard JSON-RPC error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_id_is_a_notification() {
        let req: Request = serde_json::from_value(json!({"method": "notifications/initialized"})).unwrap();
        assert!(req.is_notification());
        assert_eq!(req.jsonrpc, "2.0");
    }

    #[test]
    fn alias_becomes_tools_call() {
        let req: Request = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 3, "method": "get_balance", "params": {"token": "ETH"}
        }))
        .unwrap();
        let call = req.into_tool_call();
        assert_eq!(call.method, "tools/call");
        assert_eq!(call.id, json!(3));
        assert_eq!(call.params.unwrap(), json!({"name": "get_balance", "arguments": {"token": "ETH"}}));
    }

    #[test]
    fn error_response_omits_result() {
        let resp = Response::error(json!(1), error_codes::METHOD_NOT_FOUND, "nope".into());
        let body = serde_json::to_value(&resp).unwrap();
        assert!(body.get("result").is_none());
        assert_eq!(body["error"]["code"], -32601);
    }
}
