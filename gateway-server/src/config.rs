//! Configuration loading: a TOML file merged with environment-variable
//! overrides, then validated before the server ever binds a socket. Follows
//! the `load` -> `apply_env_overrides` -> `validate` staged pattern.

use anyhow::{anyhow, Context};
use gateway_core::common::duration_serde;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Local,
    Dev,
    Test,
    #[default]
    Main,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub debug: bool,
    /// Required operator credential; presence is checked at startup, not
    /// here (see `gateway_server::main`'s exit-code-64 path).
    #[serde(default, skip_serializing)]
    pub service_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            idle_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthKindConfig {
    None,
    Bearer,
    Header { name: String },
    QueryParam { name: String },
}

impl From<&AuthKindConfig> for gateway_core::models::AuthKind {
    fn from(value: &AuthKindConfig) -> Self {
        match value {
            AuthKindConfig::None => gateway_core::models::AuthKind::None,
            AuthKindConfig::Bearer => gateway_core::models::AuthKind::Bearer,
            AuthKindConfig::Header { name } => {
                gateway_core::models::AuthKind::Header { name: name.clone() }
            }
            AuthKindConfig::QueryParam { name } => {
                gateway_core::models::AuthKind::QueryParam { name: name.clone() }
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default = "default_auth_kind")]
    pub auth: AuthKindConfig,
    /// Environment variable holding the API key, defaulted to
    /// `{NAME}_API_KEY` when omitted.
    pub api_key_env: Option<String>,
    /// Literal paths or `re:`-prefixed regex patterns this provider allows.
    pub allowed_paths: Vec<String>,
    pub pricing_file: Option<String>,
    #[serde(default)]
    pub supports_native_usd_cost: bool,
}

fn default_auth_kind() -> AuthKindConfig {
    AuthKindConfig::Bearer
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct McpConfig {
    #[serde(default = "default_mcp_path")]
    pub path: String,
    #[serde(default)]
    pub default_upstream: String,
    #[serde(default)]
    pub upstreams: Vec<McpUpstreamConfig>,
    #[serde(default)]
    pub route_rules: Vec<RouteRuleConfig>,
}

fn default_mcp_path() -> String {
    "/mcp".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum McpUpstreamConfig {
    HttpStream {
        name: String,
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    Stdio {
        name: String,
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default)]
        restart_policy: RestartPolicyConfig,
        #[serde(default = "default_call_timeout", with = "duration_serde")]
        call_timeout: Duration,
    },
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicyConfig {
    Never,
    OnExit,
    #[default]
    OnCrash,
}

impl From<RestartPolicyConfig> for gateway_core::mcp::RestartPolicy {
    fn from(value: RestartPolicyConfig) -> Self {
        match value {
            RestartPolicyConfig::Never => gateway_core::mcp::RestartPolicy::Never,
            RestartPolicyConfig::OnExit => gateway_core::mcp::RestartPolicy::OnExit,
            RestartPolicyConfig::OnCrash => gateway_core::mcp::RestartPolicy::OnCrash,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RouteRuleConfig {
    pub match_tool: Option<String>,
    pub match_did_prefix: Option<String>,
    pub match_hostname: Option<String>,
    pub target_upstream: String,
}

impl From<&RouteRuleConfig> for gateway_core::models::RouteRule {
    fn from(value: &RouteRuleConfig) -> Self {
        gateway_core::models::RouteRule {
            match_tool: value.match_tool.clone(),
            match_did_prefix: value.match_did_prefix.clone(),
            match_hostname: value.match_hostname.clone(),
            target_upstream: value.target_upstream.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AdminConfig {
    /// DIDs allowed to call `/admin/*`. Empty means no operator has access
    /// (the admin surface stays present but unreachable) rather than open.
    #[serde(default)]
    pub did_allowlist: Vec<String>,
    /// Test-only bypass: injects a synthetic admin DID instead of checking
    /// the `DIDAuthV1` header. Never set true outside test configuration.
    #[serde(default)]
    pub skip_auth: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            multiplier: default_multiplier(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()
            .with_context(|| format!("failed to read configuration from {path}"))?;
        let mut config: Config = settings
            .try_deserialize()
            .context("failed to parse configuration")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Applies the environment variables named in the gateway's external
    /// interface: `PORT`, `HOST`, `NETWORK`, `DEBUG`, `SERVICE_KEY`,
    /// `ADMIN_DID` (comma-separated), `PRICING_MULTIPLIER`, plus per-provider
    /// `{PROVIDER}_API_KEY`/`{PROVIDER}_BASE_URL`.
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port.parse().with_context(|| format!("invalid PORT value '{port}'"))?;
        }
        if let Ok(network) = std::env::var("NETWORK") {
            self.network = match network.to_lowercase().as_str() {
                "local" => Network::Local,
                "dev" => Network::Dev,
                "test" => Network::Test,
                "main" => Network::Main,
                other => return Err(anyhow!("invalid NETWORK value '{other}'")),
            };
        }
        if let Ok(debug) = std::env::var("DEBUG") {
            self.debug = debug == "true";
        }
        if let Ok(key) = std::env::var("SERVICE_KEY") {
            self.service_key = Some(key);
        }
        if let Ok(multiplier) = std::env::var("PRICING_MULTIPLIER") {
            self.pricing.multiplier = multiplier
                .parse()
                .with_context(|| format!("invalid PRICING_MULTIPLIER value '{multiplier}'"))?;
        }
        if let Ok(allowlist) = std::env::var("ADMIN_DID") {
            self.admin.did_allowlist = allowlist
                .split(',')
                .map(|did| did.trim().to_string())
                .filter(|did| !did.is_empty())
                .collect();
        }
        for provider in &mut self.providers {
            let upper = provider.name.to_uppercase();
            if let Ok(key) = std::env::var(format!("{upper}_API_KEY")) {
                provider.api_key_env = Some(format!("{upper}_API_KEY"));
                std::env::set_var(format!("{upper}_API_KEY"), key);
            }
            if let Ok(base_url) = std::env::var(format!("{upper}_BASE_URL")) {
                provider.base_url = base_url;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("server.port must be nonzero"));
        }
        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            if provider.name.is_empty() {
                return Err(anyhow!("provider name cannot be empty"));
            }
            if !seen.insert(&provider.name) {
                return Err(anyhow!("duplicate provider name '{}'", provider.name));
            }
            if provider.allowed_paths.is_empty() {
                return Err(anyhow!(
                    "provider '{}' has no allowed paths configured",
                    provider.name
                ));
            }
        }
        if !(0.0..=2.0).contains(&self.pricing.multiplier) || self.pricing.multiplier <= 0.0 {
            return Err(anyhow!(
                "pricing.multiplier must be in (0, 2], got {}",
                self.pricing.multiplier
            ));
        }
        let mut upstream_names = std::collections::HashSet::new();
        for upstream in &self.mcp.upstreams {
            let name = match upstream {
                McpUpstreamConfig::HttpStream { name, .. } => name,
                McpUpstreamConfig::Stdio { name, .. } => name,
            };
            if !upstream_names.insert(name) {
                return Err(anyhow!("duplicate mcp upstream name '{name}'"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let mut config = Config {
            server: ServerConfig::default(),
            providers: vec![ProviderConfig {
                name: "openai".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
                auth: AuthKindConfig::Bearer,
                api_key_env: None,
                allowed_paths: vec!["/chat/completions".to_string()],
                pricing_file: None,
                supports_native_usd_cost: false,
            }],
            mcp: McpConfig::default(),
            admin: AdminConfig::default(),
            pricing: PricingConfig::default(),
            network: Network::default(),
            debug: false,
            service_key: None,
        };
        assert!(config.validate().is_ok());
        config.pricing.multiplier = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_provider_names() {
        let provider = ProviderConfig {
            name: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            auth: AuthKindConfig::Bearer,
            api_key_env: None,
            allowed_paths: vec!["/chat/completions".to_string()],
            pricing_file: None,
            supports_native_usd_cost: false,
        };
        let config = Config {
            server: ServerConfig::default(),
            providers: vec![provider.clone(), provider],
            mcp: McpConfig::default(),
            admin: AdminConfig::default(),
            pricing: PricingConfig::default(),
            network: Network::default(),
            debug: false,
            service_key: None,
        };
        assert!(config.validate().is_err());
    }
}
