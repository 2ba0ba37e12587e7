//! OpenRouter adapter: OpenAI-compatible wire format, but OpenRouter reports
//! its own USD cost per request (`usage.cost` in the response body), so this
//! adapter bypasses the Pricing Registry's token math entirely and only asks
//! it to apply the configured multiplier.

use crate::providers::{ParsedResponse, ProviderAdapter};
use crate::usage::{OpenAiUsageExtractor, UsageExtractor};
use reqwest::header::HeaderMap;
use serde_json::{json, Value};

pub struct OpenRouterAdapter;

impl ProviderAdapter for OpenRouterAdapter {
    fn test_models(&self) -> Vec<String> {
        vec!["openrouter/auto".to_string()]
    }

    fn supports_native_usd_cost(&self) -> bool {
        true
    }

    fn prepare_request(&self, incoming_body: Option<&Value>, is_streaming: bool) -> Option<Value> {
        let mut body = incoming_body?.clone();
        if is_streaming {
            let options = body
                .as_object_mut()?
                .entry("usage")
                .or_insert_with(|| json!({}));
            if let Some(obj) = options.as_object_mut() {
                obj.insert("include".to_string(), json!(true));
            }
        }
        Some(body)
    }

    fn parse_response(&self, _headers: &HeaderMap, body: &Value) -> ParsedResponse {
        let usage_obj = body.get("usage");
        let usage = usage_obj.and_then(|usage| {
            let prompt = usage.get("prompt_tokens")?.as_u64()?;
            let completion = usage.get("completion_tokens")?.as_u64()?;
            Some(crate::models::Usage::new(prompt, completion))
        });
        let native_cost_usd = usage_obj
            .and_then(|usage| usage.get("cost"))
            .and_then(Value::as_f64)
            .map(crate::money::Money::from_f64);
        ParsedResponse {
            usage,
            native_cost_usd,
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
    fn extracts_native_cost_from_usage_object() {
        let adapter = OpenRouterAdapter;
        let body = json!({"usage": {"prompt_tokens": 10, "completion_tokens": 5, "cost": 1.23}});
        let parsed = adapter.parse_response(&HeaderMap::new(), &body);
        assert_eq!(parsed.usage, Some(crate::models::Usage::new(10, 5)));
        assert!((parsed.native_cost_usd.unwrap().as_f64() - 1.23).abs() < 1e-9);
    }

    #[test]
    fn no_native_cost_when_absent() {
        let adapter = OpenRouterAdapter;
        let body = json!({"usage": {"prompt_tokens": 10, "completion_tokens": 5}});
        assert!(adapter.parse_response(&HeaderMap::new(), &body).native_cost_usd.is_none());
    }
}
