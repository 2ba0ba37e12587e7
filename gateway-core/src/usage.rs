//! Usage Extractor: per-provider parsers that pull token counts (and native
//! USD cost, when the provider reports one) out of both non-streaming bodies
//! and streaming chunk frames.
//!
//! Malformed frames are never fatal to the request: a parse failure is
//! logged and the chunk is discarded rather than torn down as an error.

use crate::models::Usage;
use serde_json::Value;

/// Result of feeding one chunk of raw upstream bytes to a streaming
/// extractor.
#[derive(Debug, Default)]
pub struct ChunkOutcome {
    /// Usage extracted from this chunk, if a complete usage-bearing frame
    /// was found. Streaming providers typically only emit this on the last
    /// frame; callers should overwrite, not accumulate.
    pub usage: Option<Usage>,
    /// `true` once the provider's own done-signal (`data: [DONE]`,
    /// `message_stop`, end of the JSON array, ...) has been observed.
    pub done: bool,
}

/// Per-provider usage extraction. One instance is created per streaming
/// request and discarded at stream end; it is not shared between requests.
pub trait UsageExtractor: Send {
    fn from_response_body(&self, body: &Value) -> Option<Usage>;
    fn feed_chunk(&mut self, raw_bytes: &[u8]) -> ChunkOutcome;
}

/// Lets a boxed extractor (what [`crate::providers::ProviderAdapter::usage_extractor`]
/// returns, since the concrete type varies per provider) drop straight into
/// `StreamTransformer<Box<dyn UsageExtractor>>` without an extra wrapper type.
impl UsageExtractor for Box<dyn UsageExtractor> {
    fn from_response_body(&self, body: &Value) -> Option<Usage> {
        (**self).from_response_body(body)
    }

    fn feed_chunk(&mut self, raw_bytes: &[u8]) -> ChunkOutcome {
        (**self).feed_chunk(raw_bytes)
    }
}

/// Tool-content token fields that count toward `promptTokens`, never
/// `completionTokens`, then are dropped from the exposed [`Usage`] record.
const TOOL_TOKEN_FIELDS: &[&str] = &[
    "web_search_tokens",
    "file_search_tokens",
    "tool_use_prompt_token_count",
];

fn fold_tool_tokens(usage: &mut Usage, container: &Value) {
    let mut extra = 0u64;
    for field in TOOL_TOKEN_FIELDS {
        if let Some(n) = container.get(field).and_then(Value::as_u64) {
            extra += n;
        }
    }
    if extra > 0 {
        usage.fold_tool_tokens(extra);
    }
}

/// Pull complete top-level `{...}` JSON objects out of `buffer` as they
/// become available, leaving any trailing partial object in place. Used by
/// the Google extractor, whose streaming wire format is a JSON array of
/// chunk objects rather than newline-delimited frames.
fn drain_json_objects(buffer: &mut String) -> Vec<Value> {
    let mut objects = Vec::new();
    let bytes = buffer.as_bytes();
    let mut depth: i32 = 0;
    let mut start: Option<usize> = None;
    let mut in_string = false;
    let mut escape = false;
    let mut consumed_up_to = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        if let Ok(text) = std::str::from_utf8(&bytes[s..=i]) {
                            if let Ok(value) = serde_json::from_str::<Value>(text) {
                                objects.push(value);
                            }
                        }
                        consumed_up_to = i + 1;
                    }
                }
            }
            _ => {}
        }
    }
    if consumed_up_to > 0 {
        buffer.drain(..consumed_up_to);
    }
    objects
}

// ---------------------------------------------------------------------
// OpenAI: SSE `data: {...}\n\n` frames, terminated by `data: [DONE]`.
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct OpenAiUsageExtractor {
    buffer: String,
}

impl OpenAiUsageExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn usage_from_value(value: &Value) -> Option<Usage> {
        let usage_obj = value.get("usage")?;
        if usage_obj.is_null() {
            return None;
        }
        let prompt = usage_obj.get("prompt_tokens").and_then(Value::as_u64)?;
        let completion = usage_obj
            .get("completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let mut usage = Usage::new(prompt, completion);
        if let Some(details) = usage_obj.get("prompt_tokens_details") {
            fold_tool_tokens(&mut usage, details);
        }
        fold_tool_tokens(&mut usage, usage_obj);
        Some(usage)
    }
}

impl UsageExtractor for OpenAiUsageExtractor {
    fn from_response_body(&self, body: &Value) -> Option<Usage> {
        Self::usage_from_value(body)
    }

    fn feed_chunk(&mut self, raw_bytes: &[u8]) -> ChunkOutcome {
        self.buffer.push_str(&String::from_utf8_lossy(raw_bytes));
        let mut outcome = ChunkOutcome::default();

        while let Some(line_end) = self.buffer.find('\n') {
            let line = self.buffer[..line_end].trim_end_matches('\r').to_string();
            self.buffer.drain(..=line_end);

            let Some(payload) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
                continue;
            };
            let payload = payload.trim();
            if payload.is_empty() {
                continue;
            }
            if payload == "[DONE]" {
                outcome.done = true;
                continue;
            }
            match serde_json::from_str::<Value>(payload) {
                Ok(value) => {
                    if let Some(usage) = Self::usage_from_value(&value) {
                        outcome.usage = Some(usage);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "discarding malformed openai stream frame");
                }
            }
        }
        outcome
    }
}

// ---------------------------------------------------------------------
// Anthropic: named SSE events (message_start / message_delta / message_stop).
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct AnthropicUsageExtractor {
    buffer: String,
    current_event: Option<String>,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

impl AnthropicUsageExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn usage_from_message_object(message: &Value) -> Option<(Option<u64>, Option<u64>)> {
        let usage = message.get("usage")?;
        Some((
            usage.get("input_tokens").and_then(Value::as_u64),
            usage.get("output_tokens").and_then(Value::as_u64),
        ))
    }
}

impl UsageExtractor for AnthropicUsageExtractor {
    fn from_response_body(&self, body: &Value) -> Option<Usage> {
        let usage_obj = body.get("usage")?;
        let input = usage_obj.get("input_tokens").and_then(Value::as_u64)?;
        let output = usage_obj.get("output_tokens").and_then(Value::as_u64).unwrap_or(0);
        Some(Usage::new(input, output))
    }

    fn feed_chunk(&mut self, raw_bytes: &[u8]) -> ChunkOutcome {
        self.buffer.push_str(&String::from_utf8_lossy(raw_bytes));
        let mut outcome = ChunkOutcome::default();

        while let Some(line_end) = self.buffer.find('\n') {
            let line = self.buffer[..line_end].trim_end_matches('\r').to_string();
            self.buffer.drain(..=line_end);

            if let Some(event) = line.strip_prefix("event: ").or_else(|| line.strip_prefix("event:")) {
                self.current_event = Some(event.trim().to_string());
                continue;
            }
            let Some(payload) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
                continue;
            };
            let payload = payload.trim();
            if payload.is_empty() {
                continue;
            }
            let value: Value = match serde_json::from_str(payload) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "discarding malformed anthropic stream frame");
                    continue;
                }
            };

            match self.current_event.as_deref() {
                Some("message_start") => {
                    if let Some(message) = value.get("message") {
                        if let Some((input, output)) = Self::usage_from_message_object(message) {
                            self.input_tokens = input.or(self.input_tokens);
                            self.output_tokens = output.or(self.output_tokens);
                        }
                    }
                }
                Some("message_delta") => {
                    if let Some(output) = value
                        .get("usage")
                        .and_then(|u| u.get("output_tokens"))
                        .and_then(Value::as_u64)
                    {
                        self.output_tokens = Some(output);
                    }
                }
                Some("message_stop") => {
                    outcome.done = true;
                    if let Some(input) = self.input_tokens {
                        outcome.usage = Some(Usage::new(input, self.output_tokens.unwrap_or(0)));
                    }
                }
                _ => {}
            }
        }
        outcome
    }
}

// ---------------------------------------------------------------------
// Google: JSON array of chunk objects carrying `usageMetadata`.
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct GoogleUsageExtractor {
    buffer: String,
}

impl GoogleUsageExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn usage_from_value(value: &Value) -> Option<Usage> {
        let meta = value.get("usageMetadata")?;
        let prompt = meta.get("promptTokenCount").and_then(Value::as_u64)?;
        let completion = meta
            .get("candidatesTokenCount")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let mut usage = Usage::new(prompt, completion);
        fold_tool_tokens(&mut usage, meta);
        Some(usage)
    }
}

impl UsageExtractor for GoogleUsageExtractor {
    fn from_response_body(&self, body: &Value) -> Option<Usage> {
        if let Some(usage) = Self::usage_from_value(body) {
            return Some(usage);
        }
        // Non-streaming responses are sometimes a one-element array too.
        body.as_array()?.last().and_then(Self::usage_from_value)
    }

    fn feed_chunk(&mut self, raw_bytes: &[u8]) -> ChunkOutcome {
        self.buffer.push_str(&String::from_utf8_lossy(raw_bytes));
        let mut outcome = ChunkOutcome::default();
        for value in drain_json_objects(&mut self.buffer) {
            if let Some(usage) = Self::usage_from_value(&value) {
                outcome.usage = Some(usage);
            }
        }
        // Google signals completion by closing the HTTP stream (array end);
        // the caller detects that via upstream EOF, not a frame here.
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_extracts_usage_only_from_last_frame() {
        let mut extractor = OpenAiUsageExtractor::new();
        let frame1 = b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n";
        let frame2 = b"data: {\"choices\":[],\"usage\":{\"prompt_tokens\":20,\"completion_tokens\":30,\"total_tokens\":50}}\n\n";
        let frame3 = b"data: [DONE]\n\n";

        let o1 = extractor.feed_chunk(frame1);
        assert!(o1.usage.is_none());
        assert!(!o1.done);

        let o2 = extractor.feed_chunk(frame2);
        assert_eq!(o2.usage, Some(Usage::new(20, 30)));

        let o3 = extractor.feed_chunk(frame3);
        assert!(o3.done);
    }

    #[test]
    fn openai_malformed_frame_is_discarded_not_fatal() {
        let mut extractor = OpenAiUsageExtractor::new();
        let outcome = extractor.feed_chunk(b"data: {not json}\n\n");
        assert!(outcome.usage.is_none());
        assert!(!outcome.done);
    }

    #[test]
    fn anthropic_merges_input_and_output_at_stop() {
        let mut extractor = AnthropicUsageExtractor::new();
        extractor.feed_chunk(
            b"event: message_start\ndata: {\"message\":{\"usage\":{\"input_tokens\":25,\"output_tokens\":1}}}\n\n",
        );
        extractor.feed_chunk(
            b"event: message_delta\ndata: {\"usage\":{\"output_tokens\":15}}\n\n",
        );
        let outcome = extractor.feed_chunk(b"event: message_stop\ndata: {}\n\n");
        assert!(outcome.done);
        assert_eq!(outcome.usage, Some(Usage::new(25, 15)));
    }

    #[test]
    fn google_drains_objects_across_chunk_boundaries() {
        let mut extractor = GoogleUsageExtractor::new();
        let first_half = b"[{\"candidates\":[]},{\"usageMetadata\":{\"promptTokenCount\":";
        let second_half = b"7,\"candidatesTokenCount\":3}}]";

        let o1 = extractor.feed_chunk(first_half);
        assert!(o1.usage.is_none());
        let o2 = extractor.feed_chunk(second_half);
        assert_eq!(o2.usage, Some(Usage::new(7, 3)));
    }
}
