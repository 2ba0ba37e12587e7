//! HTTP server wiring: the LLM reverse-proxy route, the MCP JSON-RPC route,
//! admin endpoints, and a health check, composed behind the Auth Gate and
//! Path Validator described in §4 of the component design.

use axum::body::{Body, Bytes};
use axum::extract::{FromRef, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use gateway_core::models::{RequestMeta, RequestStats};
use gateway_core::providers::create_adapter;
use gateway_core::PricingRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::AuthGate;
use crate::billing::BillingHook;
use crate::config::Config;
use crate::gateway_error::GatewayError;
use crate::mcp_handler::handle_mcp;
use crate::mcp_registry::McpRegistry;
use crate::orchestrator::Orchestrator;
use crate::router::{self, ProviderRegistry};

#[derive(Clone)]
pub struct AppState {
    pub providers: Arc<RwLock<ProviderRegistry>>,
    pub pricing: Arc<PricingRegistry>,
    pub mcp: Arc<McpRegistry>,
    pub auth: Arc<AuthGate>,
    pub orchestrator: Arc<Orchestrator>,
    pub started_at: Instant,
    pub configured_provider_count: usize,
}

impl FromRef<AppState> for Arc<McpRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.mcp.clone()
    }
}

pub async fn create_server(config: &Config) -> anyhow::Result<(Router, Arc<McpRegistry>)> {
    let http_client = reqwest::Client::builder().build()?;

    let mut providers = Vec::with_capacity(config.providers.len());
    for provider in &config.providers {
        let api_key = provider
            .api_key_env
            .as_ref()
            .and_then(|env_name| std::env::var(env_name).ok());
        providers.push(gateway_core::models::ProviderRecord {
            name: provider.name.clone(),
            base_url: provider.base_url.clone(),
            auth_kind: (&provider.auth).into(),
            api_key,
            supports_native_usd_cost: provider.supports_native_usd_cost,
            allowed_paths: provider
                .allowed_paths
                .iter()
                .map(|pattern| parse_path_rule(pattern))
                .collect(),
        });
    }
    let configured_provider_count = providers.len();
    let providers = Arc::new(RwLock::new(ProviderRegistry::new(providers)));

    let pricing = Arc::new(PricingRegistry::new());
    pricing.set_multiplier(config.pricing.multiplier)?;
    for provider in &config.providers {
        if let Some(path) = &provider.pricing_file {
            let raw = std::fs::read_to_string(path)?;
            let table: gateway_core::models::PricingTable = serde_json::from_str(&raw)?;
            pricing.load(&provider.name, table)?;
        }
    }

    let mcp_registry = Arc::new(McpRegistry::build(&config.mcp, http_client.clone()).await?);
    let mcp = mcp_registry.clone();

    let auth = Arc::new(AuthGate::new(
        Box::new(crate::auth::PassthroughVerifier),
        config.admin.did_allowlist.clone(),
        config.admin.skip_auth,
    ));

    let billing: Arc<dyn BillingHook> = Arc::new(crate::billing::LoggingBillingHook);
    let orchestrator = Arc::new(Orchestrator::new(http_client, pricing.clone(), billing));

    let state = AppState {
        providers,
        pricing,
        mcp,
        auth,
        orchestrator,
        started_at: Instant::now(),
        configured_provider_count,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route(&config.mcp.path, post(handle_mcp))
        .route("/admin/status", get(admin_status))
        .route("/admin/reload-pricing", post(admin_reload_pricing))
        .route("/{provider}/{*upstream_path}", any(proxy_handler))
        .layer(
            tower::ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(config.server.request_timeout)),
        )
        .with_state(state);

    Ok((app, mcp_registry))
}

fn parse_path_rule(pattern: &str) -> gateway_core::models::PathRule {
    match pattern.strip_prefix("re:") {
        Some(regex) => gateway_core::models::PathRule::Pattern(
            regex::Regex::new(regex).expect("configured path pattern must be a valid regex"),
        ),
        None => gateway_core::models::PathRule::Literal(pattern.to_string()),
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn admin_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(error) = state.auth.authenticate_admin(did_header(&headers)).await {
        return error.into_response();
    }
    let providers = state.providers.read().await;
    let registered: Vec<&str> = providers.names().collect();
    Json(json!({
        "registered": registered,
        "available": registered,
        "unavailable": Vec::<&str>::new(),
        "environment": {
            "uptime_seconds": state.started_at.elapsed().as_secs(),
            "configured_providers": state.configured_provider_count,
            "live_providers": providers.names().count(),
            "mcp_upstreams": state.mcp.names().collect::<Vec<_>>(),
        },
    }))
    .into_response()
}

async fn admin_reload_pricing(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(error) = state.auth.authenticate_admin(did_header(&headers)).await {
        return error.into_response();
    }
    Json(json!({ "reloaded": true, "multiplier": state.pricing.multiplier() })).into_response()
}

/// The raw `Authorization` header value, scheme prefix and all; [`AuthGate`]
/// strips the `DIDAuthV1 ` prefix itself.
fn did_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let did = match state.auth.authenticate(did_header(&headers)).await {
        Ok(did) => did,
        Err(error) => return error.into_response(),
    };

    let (record, upstream_path) = {
        let providers = state.providers.read().await;
        match router::resolve(&providers, uri.path()) {
            Ok((record, path)) => (record.clone(), path),
            Err(error) => return error.into_response(),
        }
    };

    let body_json: Option<Value> = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => Some(value),
            Err(error) => {
                return GatewayError::Validation {
                    message: format!("malformed json body: {error}"),
                    param: None,
                }
                .into_response()
            }
        }
    };

    // A bodiless call (e.g. `GET /{provider}/models`) has no model to gate
    // on and nothing billable to extract; forward it directly rather than
    // force a `model_not_supported` rejection onto non-completion endpoints.
    let Some(body_json) = body_json else {
        return forward_bodiless(&state, &record, &method, &upstream_path).await;
    };

    let is_streaming = body_json.get("stream").and_then(Value::as_bool).unwrap_or(false);
    let adapter = create_adapter(&record.name);
    let meta = RequestMeta {
        request_id: Uuid::new_v4().to_string(),
        method: method.to_string(),
        path: uri.path().to_string(),
        target_provider: record.name.clone(),
        target_path: upstream_path,
        caller_did: Some(did),
        is_streaming,
        start: Instant::now(),
    };

    if is_streaming {
        match state
            .orchestrator
            .handle_streaming(meta, RequestStats::default(), record, adapter, Some(body_json))
            .await
        {
            Ok((status, headers, stream)) => {
                let mut response = Response::new(Body::from_stream(stream));
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response
            }
            Err(error) => error.into_response(),
        }
    } else {
        let mut stats = RequestStats::default();
        match state
            .orchestrator
            .handle_buffered(&meta, &mut stats, &record, adapter.as_ref(), Some(body_json))
            .await
        {
            Ok((status, headers, body)) => {
                let mut response = Response::new(Body::from(body));
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response
            }
            Err(error) => error.into_response(),
        }
    }
}

async fn forward_bodiless(
    state: &AppState,
    record: &gateway_core::models::ProviderRecord,
    method: &Method,
    upstream_path: &str,
) -> Response {
    let adapter = create_adapter(&record.name);
    match gateway_core::providers::execute_request(
        state.orchestrator.http_client(),
        record,
        adapter.as_ref(),
        method.clone(),
        upstream_path,
        None,
    )
    .await
    {
        Ok((status, headers, body)) => {
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        Err(error) => GatewayError::from(error).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_regex_path_rule() {
        let rule = parse_path_rule("re:^/v1/.*$");
        assert!(matches!(rule, gateway_core::models::PathRule::Pattern(_)));
    }

    #[test]
    fn parses_literal_path_rule() {
        let rule = parse_path_rule("/chat/completions");
        assert!(matches!(rule, gateway_core::models::PathRule::Literal(_)));
    }
}
