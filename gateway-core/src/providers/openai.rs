//! OpenAI-compatible adapter: chat-completions and the Response API.
//!
//! The two request shapes are told apart by the presence of `messages`
//! (chat-completions) vs. `input` (Response API); only the former accepts
//! `stream_options.include_usage`.

use crate::providers::{ParsedResponse, ProviderAdapter};
use crate::usage::{OpenAiUsageExtractor, UsageExtractor};
use reqwest::header::HeaderMap;
use serde_json::{json, Value};

pub struct OpenAiAdapter;

impl ProviderAdapter for OpenAiAdapter {
    fn test_models(&self) -> Vec<String> {
        vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()]
    }

    fn prepare_request(&self, incoming_body: Option<&Value>, is_streaming: bool) -> Option<Value> {
        let mut body = incoming_body?.clone();
        if is_streaming && body.get("messages").is_some() {
            let options = body
                .as_object_mut()?
                .entry("stream_options")
                .or_insert_with(|| json!({}));
            if let Some(obj) = options.as_object_mut() {
                obj.insert("include_usage".to_string(), json!(true));
            }
        }
        Some(body)
    }

    fn parse_response(&self, _headers: &HeaderMap, body: &Value) -> ParsedResponse {
        let usage = body.get("usage").and_then(parse_openai_usage);
        ParsedResponse {
            usage,
            native_cost_usd: None,
        }
    }

    fn usage_extractor(&self) -> Box<dyn UsageExtractor> {
        Box::new(OpenAiUsageExtractor::new())
    }
}

fn parse_openai_usage(usage: &Value) -> Option<crate::models::Usage> {
    let prompt = usage.get("prompt_tokens")?.as_u64()?;
    let completion = usage.get("completion_tokens")?.as_u64()?;
    Some(crate::models::Usage::new(prompt, completion))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn injects_stream_options_for_chat_completions() {
        let adapter = OpenAiAdapter;
        let body = json!({"model": "gpt-4o-mini", "messages": []});
        let prepared = adapter.prepare_request(Some(&body), true).unwrap();
        assert_eq!(prepared["stream_options"]["include_usage"], json!(true));
    }

    #[test]
    fn does_not_inject_stream_options_for_response_api() {
        let adapter = OpenAiAdapter;
        let body = json!({"model": "gpt-4o-mini", "input": "hello"});
        let prepared = adapter.prepare_request(Some(&body), true).unwrap();
        assert!(prepared.get("stream_options").is_none());
    }

    #[test]
    fn leaves_body_untouched_for_non_streaming() {
        let adapter = OpenAiAdapter;
        let body = json!({"model": "gpt-4o-mini", "messages": []});
        let prepared = adapter.prepare_request(Some(&body), false).unwrap();
        assert!(prepared.get("stream_options").is_none());
    }

    #[test]
    fn parses_usage_from_non_streaming_response() {
        let adapter = OpenAiAdapter;
        let body = json!({"usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}});
        let parsed = adapter.parse_response(&HeaderMap::new(), &body);
        assert_eq!(parsed.usage, Some(crate::models::Usage::new(10, 5)));
    }
}
