//! Error types shared by the pricing, usage-extraction, provider-adapter and
//! MCP-proxy layers. These are transport-agnostic: `gateway-server` maps them
//! onto HTTP status codes or JSON-RPC error objects at the boundary.

use thiserror::Error;

/// Errors raised while loading or querying the Pricing Registry.
#[derive(Error, Debug)]
pub enum PricingError {
    #[error("invalid pricing config for provider '{provider}': {message}")]
    InvalidConfig { provider: String, message: String },

    #[error("family pattern references unknown base model '{base_model}'")]
    UnknownBaseModel { base_model: String },

    #[error("invalid pricing multiplier {value}: must be in (0, 2]")]
    InvalidMultiplier { value: f64 },

    #[error("invalid regex '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Errors from a single provider adapter call (auth injection, request
/// preparation, forwarding).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("upstream timed out")]
    Timeout,

    #[error("path '{path}' is not allowed for provider '{provider}'")]
    PathNotAllowed { provider: String, path: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("provider configuration error: {message}")]
    Configuration { message: String },

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
}

/// Usage extraction never fails the request; malformed frames are logged and
/// skipped. This error type exists for the few cases that are genuinely fatal
/// to the extractor's own state (not the request).
#[derive(Error, Debug)]
pub enum UsageError {
    #[error("usage record inconsistent: total {total} != prompt {prompt} + completion {completion}")]
    Inconsistent {
        prompt: u64,
        completion: u64,
        total: u64,
    },
}

/// Errors from the MCP proxy layer (stdio/http-stream upstream management,
/// JSON-RPC framing).
#[derive(Error, Debug)]
pub enum McpError {
    #[error("unknown mcp upstream '{0}'")]
    UnknownUpstream(String),

    #[error("mcp upstream '{0}' is unavailable")]
    Unavailable(String),

    #[error("failed to spawn stdio upstream '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stdio upstream io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json-rpc framing error: {0}")]
    Framing(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request timed out waiting for id {0}")]
    Timeout(serde_json::Value),
}
