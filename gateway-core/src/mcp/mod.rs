//! MCP upstream clients: stdio child processes and HTTP-streaming servers,
//! both driven through the same JSON-RPC request/response shape, plus the
//! route-rule resolution that picks which upstream handles a given call.
//!
//! Grounded on the tagged `Upstream` enum and `IncomingRequestContext`
//! header-propagation idiom from agentgateway's `mcp::upstream` module and
//! the JSON-RPC request/response/error shape from a PlexMCP-style proxy
//! route.

pub mod http_stream;
pub mod jsonrpc;
pub mod stdio;

use crate::error::McpError;
use crate::models::{RouteRule, RouteRuleKind};
use async_trait::async_trait;
use jsonrpc::{JsonRpcRequest, JsonRpcResponse};

/// What happens to a stdio child process when it exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    Never,
    OnExit,
    #[default]
    OnCrash,
}

impl RestartPolicy {
    /// Whether a child that exited with the given status should be
    /// restarted, per this policy. `clean` is `true` for `exit 0`.
    pub fn should_restart(&self, clean_exit: bool) -> bool {
        match self {
            RestartPolicy::Never => false,
            RestartPolicy::OnExit => true,
            RestartPolicy::OnCrash => !clean_exit,
        }
    }
}

/// A single MCP upstream: either a long-lived stdio child process or an
/// HTTP-streaming MCP server.
#[async_trait]
pub trait McpUpstreamClient: Send + Sync {
    fn name(&self) -> &str;

    /// Send one JSON-RPC request and wait for its correlated response.
    async fn call(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, McpError>;

    /// Release any held resources (a stdio child's process, an HTTP
    /// client's connection pool). Default no-op; [`stdio::StdioUpstream`]
    /// overrides this to terminate its child process.
    async fn close(&self) {}
}

/// Resolve which upstream handles a dispatch, applying the
/// `matchTool > matchDidPrefix > matchHostname` precedence across *all*
/// rules (not first-match-wins): the strongest-kind match anywhere in the
/// rule set wins, ties broken by rule order. Falls back to
/// `default_upstream` when nothing matches.
pub fn resolve_upstream<'a>(
    rules: &'a [RouteRule],
    default_upstream: &'a str,
    tool: Option<&str>,
    did: Option<&str>,
    hostname: Option<&str>,
) -> &'a str {
    let mut best: Option<(RouteRuleKind, &'a str)> = None;
    for rule in rules {
        if let Some(kind) = rule.match_kind(tool, did, hostname) {
            let better = match &best {
                None => true,
                Some((best_kind, _)) => rank(kind) > rank(*best_kind),
            };
            if better {
                best = Some((kind, rule.target_upstream.as_str()));
            }
        }
    }
    best.map(|(_, upstream)| upstream).unwrap_or(default_upstream)
}

fn rank(kind: RouteRuleKind) -> u8 {
    match kind {
        RouteRuleKind::Tool => 3,
        RouteRuleKind::DidPrefix => 2,
        RouteRuleKind::Hostname => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(tool: Option<&str>, did: Option<&str>, host: Option<&str>, target: &str) -> RouteRule {
        RouteRule {
            match_tool: tool.map(str::to_string),
            match_did_prefix: did.map(str::to_string),
            match_hostname: host.map(str::to_string),
            target_upstream: target.to_string(),
        }
    }

    #[test]
    fn tool_match_wins_over_hostname_match_across_rules() {
        let rules = vec![
            rule(None, None, Some("files.example.com"), "hostname-upstream"),
            rule(Some("echo"), None, None, "tool-upstream"),
        ];
        let resolved = resolve_upstream(&rules, "default", Some("echo"), None, Some("files.example.com"));
        assert_eq!(resolved, "tool-upstream");
    }

    #[test]
    fn falls_back_to_default_when_nothing_matches() {
        let rules = vec![rule(Some("other"), None, None, "tool-upstream")];
        let resolved = resolve_upstream(&rules, "default", Some("echo"), None, None);
        assert_eq!(resolved, "default");
    }

    #[test]
    fn restart_policy_on_crash_ignores_clean_exit() {
        assert!(!RestartPolicy::OnCrash.should_restart(true));
        assert!(RestartPolicy::OnCrash.should_restart(false));
        assert!(RestartPolicy::Never.should_restart(false));
        assert!(RestartPolicy::OnExit.should_restart(true));
    }
}
