//! JSON-RPC 2.0 request/response/error shapes used by every MCP upstream,
//! stdio or HTTP alike.

use crate::error::McpError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// Upstream-unavailable, not part of the base JSON-RPC spec but used
/// consistently across MCP proxies for "the upstream process/connection is
/// down".
pub const UPSTREAM_UNAVAILABLE: i64 = -32001;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "default_jsonrpc_version")]
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: Value, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: default_jsonrpc_version(),
            id,
            method: method.into(),
            params,
        }
    }

    /// The `name` parameter for a `tools/call` request, if present.
    pub fn tool_name(&self) -> Option<&str> {
        if self.method != "tools/call" {
            return None;
        }
        self.params.as_ref()?.get("name")?.as_str()
    }
}

fn default_jsonrpc_version() -> String {
    "2.0".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default = "default_jsonrpc_version")]
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: default_jsonrpc_version(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: default_jsonrpc_version(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn upstream_unavailable(upstream: &str) -> Self {
        Self::new(UPSTREAM_UNAVAILABLE, format!("mcp upstream '{upstream}' is unavailable"))
    }
}

impl From<McpError> for JsonRpcError {
    fn from(error: McpError) -> Self {
        match error {
            McpError::Unavailable(name) => JsonRpcError::upstream_unavailable(&name),
            McpError::UnknownUpstream(name) => JsonRpcError::upstream_unavailable(&name),
            McpError::Timeout(_) => JsonRpcError::new(UPSTREAM_UNAVAILABLE, "mcp call timed out"),
            other => JsonRpcError::new(INTERNAL_ERROR, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_name_extracted_from_tools_call() {
        let req = JsonRpcRequest::new(
            json!(1),
            "tools/call",
            Some(json!({"name": "echo", "arguments": {"text": "hello"}})),
        );
        assert_eq!(req.tool_name(), Some("echo"));
    }

    #[test]
    fn tool_name_none_for_other_methods() {
        let req = JsonRpcRequest::new(json!(1), "tools/list", None);
        assert_eq!(req.tool_name(), None);
    }

    #[test]
    fn roundtrips_through_json() {
        let resp = JsonRpcResponse::success(json!(1), json!({"tools": []}));
        let text = serde_json::to_string(&resp).unwrap();
        let parsed: JsonRpcResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.id, json!(1));
        assert!(parsed.error.is_none());
    }
}
