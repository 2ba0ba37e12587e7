//! HTTP-streaming MCP upstream: POSTs a JSON-RPC request to the upstream's
//! endpoint and reads back a single correlated JSON-RPC response body.

use crate::error::McpError;
use crate::mcp::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use crate::mcp::McpUpstreamClient;
use async_trait::async_trait;
use reqwest::Client;

#[derive(Debug, Clone)]
pub struct HttpStreamConfig {
    pub name: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

pub struct HttpStreamUpstream {
    config: HttpStreamConfig,
    client: Client,
}

impl HttpStreamUpstream {
    pub fn new(config: HttpStreamConfig, client: Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl McpUpstreamClient for HttpStreamUpstream {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn call(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, McpError> {
        let mut builder = self.client.post(&self.config.url).json(&request);
        for (name, value) in &self.config.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(McpError::Unavailable(self.config.name.clone()));
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(McpError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_clones_headers() {
        let config = HttpStreamConfig {
            name: "remote".to_string(),
            url: "https://mcp.example.com/rpc".to_string(),
            headers: vec![("x-api-key".to_string(), "secret".to_string())],
        };
        assert_eq!(config.headers.len(), 1);
    }
}
