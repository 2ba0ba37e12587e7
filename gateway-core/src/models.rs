//! Typed data model shared across the pricing, usage-extraction, provider-adapter
//! and MCP layers. Normalizes the ad-hoc JSON the original system passed around
//! into a small set of structs with explicit invariants.

use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token-count triple for one LLM turn. `total_tokens`, when present on the
/// wire, is cross-checked against `prompt_tokens + completion_tokens` by
/// [`Usage::is_consistent`]; callers decide whether to warn or hard-fail.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.total_tokens == self.prompt_tokens + self.completion_tokens
    }

    /// Fold tool-content token counts (web search, file search, etc.) into
    /// `prompt_tokens`, per the "tool-content tokens are prompt tokens" rule.
    pub fn fold_tool_tokens(&mut self, tool_tokens: u64) {
        self.prompt_tokens += tool_tokens;
        self.total_tokens += tool_tokens;
    }

    /// Later-extracted usage overwrites earlier partial usage during
    /// streaming; most providers only emit final counts on the last frame.
    pub fn merge_overwrite(&mut self, newer: Usage) {
        *self = newer;
    }
}

/// Where a [`CostRecord`]'s dollar amount came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CostSource {
    Provider,
    GatewayPricing,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostRecord {
    pub cost_usd: Money,
    pub source: CostSource,
    pub model: String,
    pub usage: Option<Usage>,
    pub pricing_version: Option<String>,
}

/// Per-model unit prices, denominated per one million tokens.
#[derive(Debug, Clone)]
pub struct UnitPrice {
    pub prompt_price_per_mtok: Money,
    pub completion_price_per_mtok: Money,
    pub description: Option<String>,
}

/// Ordered regex -> base-model fallback used when a concrete model id has no
/// exact entry in a provider's price table.
#[derive(Debug, Clone)]
pub struct FamilyPattern {
    pub pattern: regex::Regex,
    pub base_model: String,
    pub description: Option<String>,
}

/// A provider's full price table, as loaded from its pricing config file.
#[derive(Debug, Clone)]
pub struct PricingTable {
    pub version: String,
    pub models: HashMap<String, UnitPrice>,
    pub family_patterns: Vec<FamilyPattern>,
}

impl PricingTable {
    /// Validates the invariants from the data model: every family pattern's
    /// base model must exist in `models`, and no price may be negative.
    pub fn validate(&self) -> Result<(), crate::error::PricingError> {
        for price in self.models.values() {
            if price.prompt_price_per_mtok.is_negative()
                || price.completion_price_per_mtok.is_negative()
            {
                return Err(crate::error::PricingError::InvalidConfig {
                    provider: String::new(),
                    message: "model prices must be non-negative".to_string(),
                });
            }
        }
        for pattern in &self.family_patterns {
            if !self.models.contains_key(&pattern.base_model) {
                return Err(crate::error::PricingError::UnknownBaseModel {
                    base_model: pattern.base_model.clone(),
                });
            }
        }
        Ok(())
    }
}

/// How a provider adapter authenticates outbound requests.
#[derive(Debug, Clone)]
pub enum AuthKind {
    None,
    Bearer,
    Header { name: String },
    QueryParam { name: String },
}

/// An allowed-path entry in a provider's allowlist: either a literal path or
/// a regex. Path Validator checks membership against this set.
#[derive(Debug, Clone)]
pub enum PathRule {
    Literal(String),
    Pattern(regex::Regex),
}

impl PathRule {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathRule::Literal(literal) => literal == path,
            PathRule::Pattern(re) => re.is_match(path),
        }
    }
}

/// Static, process-lifetime configuration for one upstream LLM provider.
#[derive(Debug, Clone)]
pub struct ProviderRecord {
    pub name: String,
    pub base_url: String,
    pub auth_kind: AuthKind,
    pub api_key: Option<String>,
    pub supports_native_usd_cost: bool,
    pub allowed_paths: Vec<PathRule>,
}

impl ProviderRecord {
    pub fn path_allowed(&self, path: &str) -> bool {
        self.allowed_paths.iter().any(|rule| rule.matches(path))
    }
}

/// Immutable metadata captured when a request is first admitted; cloned
/// cheaply (no interior mutability) and safe to read from any task.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub target_provider: String,
    pub target_path: String,
    pub caller_did: Option<String>,
    pub is_streaming: bool,
    pub start: std::time::Instant,
}

/// Mutable fields accumulated while a single request is being handled. Owned
/// by the task processing that request; never shared across tasks.
#[derive(Debug, Default)]
pub struct RequestStats {
    pub selected_model: Option<String>,
    pub usage: Option<Usage>,
    pub cost: Option<Money>,
    pub cost_source: Option<CostSource>,
    pub mcp_tool_name: Option<String>,
    pub upstream_latency: Option<std::time::Duration>,
    pub stage_timings: HashMap<String, std::time::Duration>,
}

impl RequestStats {
    pub fn record_stage(&mut self, stage: &str, elapsed: std::time::Duration) {
        self.stage_timings.insert(stage.to_string(), elapsed);
    }
}

/// An MCP route rule; first match wins, tie-break order is tool > DID prefix
/// > hostname.
#[derive(Debug, Clone, Default)]
pub struct RouteRule {
    pub match_tool: Option<String>,
    pub match_did_prefix: Option<String>,
    pub match_hostname: Option<String>,
    pub target_upstream: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRuleKind {
    Tool,
    DidPrefix,
    Hostname,
}

impl RouteRule {
    /// Returns the strongest match kind for this rule against the given
    /// dispatch facts, or `None` if it does not match at all.
    pub fn match_kind(&self, tool: Option<&str>, did: Option<&str>, hostname: Option<&str>) -> Option<RouteRuleKind> {
        if let (Some(want), Some(got)) = (&self.match_tool, tool) {
            if want == got {
                return Some(RouteRuleKind::Tool);
            }
        }
        if let (Some(prefix), Some(got)) = (&self.match_did_prefix, did) {
            if got.starts_with(prefix.as_str()) {
                return Some(RouteRuleKind::DidPrefix);
            }
        }
        if let (Some(want), Some(got)) = (&self.match_hostname, hostname) {
            if want == got {
                return Some(RouteRuleKind::Hostname);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_consistency() {
        let u = Usage::new(10, 20);
        assert!(u.is_consistent());
        let bad = Usage {
            prompt_tokens: 10,
            completion_tokens: 20,
            total_tokens: 31,
        };
        assert!(!bad.is_consistent());
    }

    #[test]
    fn tool_tokens_fold_into_prompt() {
        let mut u = Usage::new(100, 50);
        u.fold_tool_tokens(15);
        assert_eq!(u.prompt_tokens, 115);
        assert_eq!(u.total_tokens, 165);
        assert_eq!(u.completion_tokens, 50);
    }

    #[test]
    fn route_rule_precedence() {
        let rule = RouteRule {
            match_tool: Some("echo".to_string()),
            match_did_prefix: Some("did:example:".to_string()),
            match_hostname: None,
            target_upstream: "primary".to_string(),
        };
        assert_eq!(
            rule.match_kind(Some("echo"), Some("did:example:abc"), None),
            Some(RouteRuleKind::Tool)
        );
        assert_eq!(
            rule.match_kind(Some("other"), Some("did:example:abc"), None),
            Some(RouteRuleKind::DidPrefix)
        );
    }
}
