//! MCP Proxy Layer: the JSON-RPC 2.0 axum handler mounted at the configured
//! path (default `/mcp`). Resolves the upstream via the Router (by tool name
//! / DID prefix / hostname) and relays the call, preserving the upstream's
//! `{code,message,data}` error shape on failure rather than the REST
//! `GatewayError` shape.
//!
//! Streaming tool-call chunks as SSE (spec'd for an HTTP-origin client) is
//! not implemented: both upstream transports here speak a unary
//! request/response JSON-RPC frame, so there is nothing to chunk. Recorded
//! as a scope decision in DESIGN.md rather than silently dropped.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use gateway_core::mcp::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, UPSTREAM_UNAVAILABLE};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::strip_scheme;
use crate::mcp_registry::McpRegistry;

pub async fn handle_mcp(
    State(registry): State<Arc<McpRegistry>>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    let started = Instant::now();
    let tool = request.tool_name();
    let did = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(strip_scheme);
    let hostname = headers.get(axum::http::header::HOST).and_then(|value| value.to_str().ok());

    let Some(upstream) = registry.resolve(tool, did, hostname) else {
        return Json(JsonRpcResponse::failure(
            request.id,
            JsonRpcError::new(UPSTREAM_UNAVAILABLE, "no mcp upstream resolved for this request"),
        ));
    };

    let id = request.id.clone();
    let response = match upstream.call(request).await {
        Ok(response) => response,
        Err(error) => JsonRpcResponse::failure(id, error.into()),
    };
    tracing::debug!(upstream = upstream.name(), elapsed_ms = %started.elapsed().as_millis(), "mcp call relayed");
    Json(response)
}
