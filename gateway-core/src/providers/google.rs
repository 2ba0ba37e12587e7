//! Google Gemini adapter: API key goes in a query parameter
//! ([`crate::models::AuthKind::QueryParam`] handles placement), usage comes
//! back under `usageMetadata` with its own field names.

use crate::providers::{ParsedResponse, ProviderAdapter};
use crate::usage::{GoogleUsageExtractor, UsageExtractor};
use reqwest::header::HeaderMap;
use serde_json::Value;

pub struct GoogleAdapter;

impl ProviderAdapter for GoogleAdapter {
    fn test_models(&self) -> Vec<String> {
        vec!["gemini-1.5-pro".to_string(), "gemini-1.5-flash".to_string()]
    }

    fn prepare_request(&self, incoming_body: Option<&Value>, _is_streaming: bool) -> Option<Value> {
        incoming_body.cloned()
    }

    fn parse_response(&self, _headers: &HeaderMap, body: &Value) -> ParsedResponse {
        let usage = body.get("usageMetadata").and_then(|meta| {
            let prompt = meta.get("promptTokenCount")?.as_u64()?;
            let completion = meta.get("candidatesTokenCount")?.as_u64()?;
            let mut usage = crate::models::Usage::new(prompt, completion);
            if let Some(tool) = meta.get("toolUsePromptTokenCount").and_then(Value::as_u64) {
                usage.fold_tool_tokens(tool);
            }
            Some(usage)
        });
        ParsedResponse {
            usage,
            native_cost_usd: None,
        }
    }

    fn usage_extractor(&self) -> Box<dyn UsageExtractor> {
        Box::new(GoogleUsageExtractor::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_usage_metadata() {
        let adapter = GoogleAdapter;
        let body = json!({"usageMetadata": {"promptTokenCount": 20, "candidatesTokenCount": 30, "totalTokenCount": 50}});
        let parsed = adapter.parse_response(&HeaderMap::new(), &body);
        assert_eq!(parsed.usage, Some(crate::models::Usage::new(20, 30)));
    }

    #[test]
    fn missing_usage_metadata_yields_none() {
        let adapter = GoogleAdapter;
        let body = json!({"candidates": []});
        assert!(adapter.parse_response(&HeaderMap::new(), &body).usage.is_none());
    }
}
