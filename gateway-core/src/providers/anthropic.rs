//! Anthropic Messages API adapter: `x-api-key` + `anthropic-version` auth,
//! `input_tokens`/`output_tokens` usage naming.

use crate::providers::{ParsedResponse, ProviderAdapter};
use crate::usage::{AnthropicUsageExtractor, UsageExtractor};
use reqwest::header::HeaderMap;
use serde_json::Value;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter;

impl ProviderAdapter for AnthropicAdapter {
    fn test_models(&self) -> Vec<String> {
        vec!["claude-3-5-sonnet-latest".to_string()]
    }

    fn extra_headers(&self) -> Vec<(&'static str, String)> {
        vec![("anthropic-version", ANTHROPIC_VERSION.to_string())]
    }

    fn prepare_request(&self, incoming_body: Option<&Value>, _is_streaming: bool) -> Option<Value> {
        incoming_body.cloned()
    }

    fn parse_response(&self, _headers: &HeaderMap, body: &Value) -> ParsedResponse {
        let usage = body.get("usage").and_then(|u| {
            let input = u.get("input_tokens")?.as_u64()?;
            let output = u.get("output_tokens")?.as_u64()?;
            let mut usage = crate::models::Usage::new(input, output);
            if let Some(cache_read) = u.get("cache_read_input_tokens").and_then(Value::as_u64) {
                usage.fold_tool_tokens(cache_read);
            }
            Some(usage)
        });
        ParsedResponse {
            usage,
            native_cost_usd: None,
        }
    }

    fn usage_extractor(&self) -> Box<dyn UsageExtractor> {
        Box::new(AnthropicUsageExtractor::new())
    }
}
