//! Fallback adapter for any OpenAI-compatible upstream the gateway has no
//! dedicated adapter for (self-hosted vLLM/llama.cpp servers, LiteLLM
//! proxies, etc.). Forwards the body unchanged and reuses the OpenAI SSE
//! usage shape, which the overwhelming majority of these servers emulate.

use crate::providers::{ParsedResponse, ProviderAdapter};
use crate::usage::{OpenAiUsageExtractor, UsageExtractor};
use reqwest::header::HeaderMap;
use serde_json::Value;

pub struct GenericAdapter;

impl ProviderAdapter for GenericAdapter {
    fn prepare_request(&self, incoming_body: Option<&Value>, _is_streaming: bool) -> Option<Value> {
        incoming_body.cloned()
    }

    fn parse_response(&self, _headers: &HeaderMap, body: &Value) -> ParsedResponse {
        let usage = body.get("usage").and_then(|usage| {
            let prompt = usage.get("prompt_tokens")?.as_u64()?;
            let completion = usage.get("completion_tokens")?.as_u64()?;
            Some(crate::models::Usage::new(prompt, completion))
        });
        ParsedResponse {
            usage,
            native_cost_usd: None,
        }
    }

    fn usage_extractor(&self) -> Box<dyn UsageExtractor> {
        Box::new(OpenAiUsageExtractor::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn passes_body_through_unchanged() {
        let adapter = GenericAdapter;
        let body = json!({"model": "local-llama", "messages": []});
        let prepared = adapter.prepare_request(Some(&body), true).unwrap();
        assert_eq!(prepared, body);
    }
}
