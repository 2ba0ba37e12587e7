//! Provider Adapter: the per-upstream behavior the Request Orchestrator
//! composes with a [`ProviderRecord`](crate::models::ProviderRecord) (which
//! holds the static endpoint/auth/allowlist data) to forward one request.
//!
//! Auth injection is generic over [`AuthKind`] — most providers only differ
//! in where the key goes (header, bearer, query param) — so it is a free
//! function here rather than a per-adapter trait method. What genuinely
//! varies per provider is request shaping, response parsing and usage
//! extraction; that is what the trait below captures.

pub mod anthropic;
pub mod generic;
pub mod google;
pub mod http_client;
pub mod openai;
pub mod openrouter;

use crate::error::ProviderError;
use crate::models::{AuthKind, ProviderRecord, Usage};
use crate::money::Money;
use crate::usage::UsageExtractor;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header::HeaderMap, Client, Method, RequestBuilder};
use serde_json::Value;

/// What [`ProviderAdapter::parse_response`] pulls out of a completed
/// non-streaming response.
#[derive(Debug, Default)]
pub struct ParsedResponse {
    pub usage: Option<Usage>,
    pub native_cost_usd: Option<Money>,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Models accepted for diagnostics only (`GET /admin/status` style
    /// tooling); never used to gate real traffic.
    fn test_models(&self) -> Vec<String> {
        vec![]
    }

    /// Static headers beyond the generic auth header, e.g. Anthropic's
    /// `anthropic-version`.
    fn extra_headers(&self) -> Vec<(&'static str, String)> {
        vec![]
    }

    /// `true` if this provider reports its own USD cost (a response header
    /// or an in-body field), bypassing the Pricing Registry entirely.
    fn supports_native_usd_cost(&self) -> bool {
        false
    }

    /// Mutate the outgoing JSON body before forwarding. `None` for bodiless
    /// requests. Example: inject `stream_options.include_usage = true` for
    /// an OpenAI chat-completions streaming request, but not for a Response
    /// API request (detected by the presence of `input` instead of
    /// `messages`), which does not accept that field.
    fn prepare_request(&self, incoming_body: Option<&Value>, is_streaming: bool) -> Option<Value>;

    /// Extract usage and any native USD cost from a completed, fully
    /// buffered non-streaming response.
    fn parse_response(&self, headers: &HeaderMap, body: &Value) -> ParsedResponse;

    /// A fresh per-request usage extractor for streaming responses.
    fn usage_extractor(&self) -> Box<dyn UsageExtractor>;
}

/// Attach provider authentication to an outgoing request builder, per the
/// provider record's configured [`AuthKind`].
pub fn inject_auth(builder: RequestBuilder, auth: &AuthKind, api_key: Option<&str>) -> RequestBuilder {
    match (auth, api_key) {
        (AuthKind::None, _) => builder,
        (AuthKind::Bearer, Some(key)) => builder.bearer_auth(key),
        (AuthKind::Header { name }, Some(key)) => builder.header(name.as_str(), key),
        (AuthKind::QueryParam { name }, Some(key)) => builder.query(&[(name.as_str(), key)]),
        (_, None) => builder,
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{}{}", base.trim_end_matches('/'), path)
    } else {
        format!("{}/{}", base.trim_end_matches('/'), path)
    }
}

fn build_request(
    client: &Client,
    record: &ProviderRecord,
    adapter: &dyn ProviderAdapter,
    method: Method,
    upstream_path: &str,
    outgoing_body: Option<Value>,
) -> RequestBuilder {
    let url = join_url(&record.base_url, upstream_path);
    let mut builder = client.request(method, url);
    builder = inject_auth(builder, &record.auth_kind, record.api_key.as_deref());
    for (name, value) in adapter.extra_headers() {
        builder = builder.header(name, value);
    }
    if let Some(body) = outgoing_body {
        builder = builder.json(&body);
    }
    builder
}

/// Bundles preparation + auth + forwarding for a non-streaming request, so
/// tests and the orchestrator share one code path.
pub async fn execute_request(
    client: &Client,
    record: &ProviderRecord,
    adapter: &dyn ProviderAdapter,
    method: Method,
    upstream_path: &str,
    incoming_body: Option<Value>,
) -> Result<(reqwest::StatusCode, HeaderMap, Bytes), ProviderError> {
    let outgoing_body = adapter.prepare_request(incoming_body.as_ref(), false);
    let builder = build_request(client, record, adapter, method, upstream_path, outgoing_body);
    let response = builder.send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?;
    Ok((status, headers, body))
}

/// Same as [`execute_request`] but returns the raw `reqwest::Response` so the
/// caller can drive [`crate::stream::StreamTransformer`] over `bytes_stream()`
/// while forwarding bytes downstream as they arrive.
pub async fn execute_stream_request(
    client: &Client,
    record: &ProviderRecord,
    adapter: &dyn ProviderAdapter,
    method: Method,
    upstream_path: &str,
    incoming_body: Option<Value>,
) -> Result<reqwest::Response, ProviderError> {
    let outgoing_body = adapter.prepare_request(incoming_body.as_ref(), true);
    let builder = build_request(client, record, adapter, method, upstream_path, outgoing_body);
    Ok(builder.send().await?)
}

/// Construct the built-in adapter for a named provider. Any name this
/// gateway has no dedicated adapter for falls back to a generic
/// OpenAI-compatible passthrough.
pub fn create_adapter(provider_name: &str) -> Box<dyn ProviderAdapter> {
    match provider_name {
        "openai" => Box::new(openai::OpenAiAdapter),
        "anthropic" => Box::new(anthropic::AnthropicAdapter),
        "google" | "gemini" => Box::new(google::GoogleAdapter),
        "openrouter" => Box::new(openrouter::OpenRouterAdapter),
        _ => Box::new(generic::GenericAdapter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PathRule;

    fn openai_record() -> ProviderRecord {
        ProviderRecord {
            name: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            auth_kind: AuthKind::Bearer,
            api_key: Some("sk-test".to_string()),
            supports_native_usd_cost: false,
            allowed_paths: vec![PathRule::Literal("/chat/completions".to_string())],
        }
    }

    #[test]
    fn join_url_handles_leading_slash() {
        assert_eq!(
            join_url("https://api.openai.com/v1", "/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            join_url("https://api.openai.com/v1/", "chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn create_adapter_falls_back_to_generic_for_unknown_name() {
        let adapter = create_adapter("totally-custom-upstream");
        assert!(!adapter.supports_native_usd_cost());
    }

    #[test]
    fn openai_adapter_injects_bearer_auth() {
        let record = openai_record();
        let client = Client::new();
        let adapter = create_adapter("openai");
        let builder = build_request(&client, &record, adapter.as_ref(), Method::POST, "/chat/completions", None);
        let req = builder.build().unwrap();
        assert_eq!(
            req.headers().get("authorization").unwrap(),
            "Bearer sk-test"
        );
    }
}
