//! Path Validator & Router: resolves `/{provider}/{upstreamPath...}` to a
//! configured [`ProviderRecord`] and checks the upstream path against that
//! provider's allowlist before anything is forwarded.

use gateway_core::models::ProviderRecord;
use std::collections::HashMap;

use crate::gateway_error::GatewayError;

pub struct ProviderRegistry {
    providers: HashMap<String, ProviderRecord>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<ProviderRecord>) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ProviderRecord> {
        self.providers.get(name)
    }

    /// Remove a provider. Only used by tests that need to simulate a
    /// provider disappearing mid-run.
    pub fn unregister(&mut self, name: &str) -> Option<ProviderRecord> {
        self.providers.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

/// Splits an incoming gateway path of the form `/{provider}/{rest...}` into
/// the provider name and the upstream path (with its leading slash kept,
/// since provider allowlists are matched against it verbatim).
pub fn split_provider_path(full_path: &str) -> Option<(&str, String)> {
    let trimmed = full_path.trim_start_matches('/');
    let (provider, rest) = trimmed.split_once('/')?;
    if provider.is_empty() {
        return None;
    }
    Some((provider, format!("/{rest}")))
}

/// Resolves the provider and validates the upstream path against its
/// allowlist, or returns the 404 taxonomy entries spec'd for an unknown
/// provider / disallowed path.
pub fn resolve<'a>(
    registry: &'a ProviderRegistry,
    full_path: &str,
) -> Result<(&'a ProviderRecord, String), GatewayError> {
    let (provider_name, upstream_path) = split_provider_path(full_path).ok_or_else(|| GatewayError::NotFound {
        message: format!("no provider in path '{full_path}'"),
    })?;
    let record = registry.get(provider_name).ok_or_else(|| GatewayError::NotFound {
        message: format!("unknown provider '{provider_name}'"),
    })?;
    if !record.path_allowed(&upstream_path) {
        return Err(GatewayError::NotFound {
            message: format!("path '{upstream_path}' is not allowed for provider '{provider_name}'"),
        });
    }
    Ok((record, upstream_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::models::{AuthKind, PathRule};

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(vec![ProviderRecord {
            name: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            auth_kind: AuthKind::Bearer,
            api_key: Some("sk-test".to_string()),
            supports_native_usd_cost: false,
            allowed_paths: vec![PathRule::Literal("/chat/completions".to_string())],
        }])
    }

    #[test]
    fn splits_provider_and_upstream_path() {
        assert_eq!(
            split_provider_path("/openai/chat/completions"),
            Some(("openai", "/chat/completions".to_string()))
        );
    }

    #[test]
    fn resolves_allowed_path() {
        let registry = registry();
        let (record, path) = resolve(&registry, "/openai/chat/completions").unwrap();
        assert_eq!(record.name, "openai");
        assert_eq!(path, "/chat/completions");
    }

    #[test]
    fn rejects_unknown_provider() {
        let registry = registry();
        assert!(resolve(&registry, "/unknown/chat/completions").is_err());
    }

    #[test]
    fn rejects_disallowed_path() {
        let registry = registry();
        assert!(resolve(&registry, "/openai/embeddings").is_err());
    }
}
