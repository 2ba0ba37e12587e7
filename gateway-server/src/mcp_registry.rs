//! Builds the set of MCP upstream clients from [`crate::config::McpConfig`]
//! at startup and resolves which one handles a given JSON-RPC call.

use gateway_core::mcp::http_stream::{HttpStreamConfig, HttpStreamUpstream};
use gateway_core::mcp::stdio::{StdioConfig, StdioUpstream};
use gateway_core::mcp::{resolve_upstream, McpUpstreamClient};
use gateway_core::models::RouteRule;
use std::collections::HashMap;

use crate::config::McpConfig;

pub struct McpRegistry {
    upstreams: HashMap<String, Box<dyn McpUpstreamClient>>,
    route_rules: Vec<RouteRule>,
    default_upstream: String,
}

impl McpRegistry {
    pub async fn build(config: &McpConfig, client: reqwest::Client) -> anyhow::Result<Self> {
        let mut upstreams: HashMap<String, Box<dyn McpUpstreamClient>> = HashMap::new();
        for upstream in &config.upstreams {
            match upstream {
                crate::config::McpUpstreamConfig::HttpStream { name, url, headers } => {
                    let upstream = HttpStreamUpstream::new(
                        HttpStreamConfig {
                            name: name.clone(),
                            url: url.clone(),
                            headers: headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                        },
                        client.clone(),
                    );
                    upstreams.insert(name.clone(), Box::new(upstream));
                }
                crate::config::McpUpstreamConfig::Stdio {
                    name,
                    command,
                    args,
                    env,
                    restart_policy,
                    call_timeout,
                } => {
                    let upstream = StdioUpstream::spawn(StdioConfig {
                        name: name.clone(),
                        command: command.clone(),
                        args: args.clone(),
                        env: env.clone(),
                        restart_policy: (*restart_policy).into(),
                        call_timeout: *call_timeout,
                    })
                    .await?;
                    upstreams.insert(name.clone(), Box::new(upstream));
                }
            }
        }
        Ok(Self {
            upstreams,
            route_rules: config.route_rules.iter().map(RouteRule::from).collect(),
            default_upstream: config.default_upstream.clone(),
        })
    }

    pub fn resolve(
        &self,
        tool: Option<&str>,
        did: Option<&str>,
        hostname: Option<&str>,
    ) -> Option<&dyn McpUpstreamClient> {
        let name = resolve_upstream(&self.route_rules, &self.default_upstream, tool, did, hostname);
        self.upstreams.get(name).map(|upstream| upstream.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.upstreams.keys().map(String::as_str)
    }

    /// Shut every upstream down gracefully (stdio children get the
    /// `exit`-then-SIGKILL sequence; HTTP-stream upstreams are a no-op).
    /// Called once on server shutdown, not per-request.
    pub async fn close_all(&self) {
        for upstream in self.upstreams.values() {
            upstream.close().await;
        }
    }
}
