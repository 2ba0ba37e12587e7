//! Pricing Registry: per-provider price tables, model-id resolution, and
//! decimal-safe USD cost calculation.
//!
//! The registry is a plain struct handed to whoever needs it (the
//! orchestrator, the admin reload handler, tests) rather than a global
//! singleton — `reload()` swaps an `Arc<PricingTable>` so callers that
//! captured a snapshot at request entry keep using it for that request.

use crate::error::PricingError;
use crate::models::{CostRecord, CostSource, PricingTable, UnitPrice, Usage};
use crate::money::Money;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct PricingRegistry {
    tables: RwLock<HashMap<String, Arc<PricingTable>>>,
    multiplier: RwLock<f64>,
}

impl Default for PricingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingRegistry {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            multiplier: RwLock::new(1.0),
        }
    }

    /// Install a parsed pricing table for `provider`, validating the
    /// invariants from the data model. Also used by `reload()`.
    pub fn load(&self, provider: &str, table: PricingTable) -> Result<(), PricingError> {
        table.validate().map_err(|e| match e {
            PricingError::InvalidConfig { message, .. } => PricingError::InvalidConfig {
                provider: provider.to_string(),
                message,
            },
            other => other,
        })?;
        self.tables
            .write()
            .expect("pricing table lock poisoned")
            .insert(provider.to_string(), Arc::new(table));
        Ok(())
    }

    /// Atomically replace the in-memory table for `provider`. In-flight
    /// requests that already captured a snapshot via [`Self::snapshot`] keep
    /// using the old `Arc` until they finish.
    pub fn reload(&self, provider: &str, table: PricingTable) -> Result<(), PricingError> {
        self.load(provider, table)
    }

    pub fn set_multiplier(&self, value: f64) -> Result<(), PricingError> {
        if !(value > 0.0 && value <= 2.0) {
            return Err(PricingError::InvalidMultiplier { value });
        }
        *self.multiplier.write().expect("multiplier lock poisoned") = value;
        Ok(())
    }

    pub fn multiplier(&self) -> f64 {
        *self.multiplier.read().expect("multiplier lock poisoned")
    }

    /// A read-mostly snapshot of one provider's table, or `None` if no table
    /// has been loaded for it. Callers should grab this once per request.
    pub fn snapshot(&self, provider: &str) -> Option<Arc<PricingTable>> {
        self.tables
            .read()
            .expect("pricing table lock poisoned")
            .get(provider)
            .cloned()
    }

    /// Exact lookup in `models`; on miss, walk `familyPatterns` in order and
    /// return the first match's base price. Deterministic: identical inputs
    /// always produce identical outputs.
    pub fn get_unit_price(&self, provider: &str, model_id: &str) -> Option<UnitPrice> {
        let table = self.snapshot(provider)?;
        Self::resolve_unit_price(&table, model_id)
    }

    pub fn resolve_unit_price(table: &PricingTable, model_id: &str) -> Option<UnitPrice> {
        if let Some(price) = table.models.get(model_id) {
            return Some(price.clone());
        }
        for pattern in &table.family_patterns {
            if pattern.pattern.is_match(model_id) {
                return table.models.get(&pattern.base_model).cloned();
            }
        }
        None
    }

    /// `true` if the provider reports a native USD cost itself, or the
    /// registry can price the model from its own tables. This is the gate
    /// the orchestrator checks before forwarding a request upstream.
    pub fn is_model_supported(
        &self,
        provider: &str,
        model_id: &str,
        provider_has_native_cost: bool,
    ) -> bool {
        provider_has_native_cost || self.get_unit_price(provider, model_id).is_some()
    }

    /// `cost = (promptTokens/1e6)*promptPrice + (completionTokens/1e6)*completionPrice`,
    /// rounded half-even to 12 decimals, then scaled by the global multiplier.
    /// Returns `None` when the unit price is unknown; the registry never
    /// computes a cost for models it cannot price.
    pub fn calculate(
        &self,
        provider: &str,
        model_id: &str,
        usage: Usage,
    ) -> Option<CostRecord> {
        let table = self.snapshot(provider)?;
        let price = Self::resolve_unit_price(&table, model_id)?;
        let prompt_cost = price
            .prompt_price_per_mtok
            .mul_div_round(usage.prompt_tokens as i128, 1_000_000);
        let completion_cost = price
            .completion_price_per_mtok
            .mul_div_round(usage.completion_tokens as i128, 1_000_000);
        let cost_usd = (prompt_cost + completion_cost).mul_rate_round(self.multiplier());
        Some(CostRecord {
            cost_usd,
            source: CostSource::GatewayPricing,
            model: model_id.to_string(),
            usage: Some(usage),
            pricing_version: Some(table.version.clone()),
        })
    }

    /// Build a `CostRecord` from a native USD amount reported by the
    /// provider itself (still scaled by the global multiplier last).
    pub fn native_cost_record(
        &self,
        model_id: &str,
        native_cost: Money,
        usage: Option<Usage>,
    ) -> CostRecord {
        CostRecord {
            cost_usd: native_cost.mul_rate_round(self.multiplier()),
            source: CostSource::Provider,
            model: model_id.to_string(),
            usage,
            pricing_version: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FamilyPattern;
    use regex::Regex;

    fn price(prompt: &str, completion: &str) -> UnitPrice {
        UnitPrice {
            prompt_price_per_mtok: Money::from_decimal_str(prompt).unwrap(),
            completion_price_per_mtok: Money::from_decimal_str(completion).unwrap(),
            description: None,
        }
    }

    fn table_with(models: Vec<(&str, UnitPrice)>, patterns: Vec<FamilyPattern>) -> PricingTable {
        PricingTable {
            version: "v1".to_string(),
            models: models
                .into_iter()
                .map(|(id, p)| (id.to_string(), p))
                .collect(),
            family_patterns: patterns,
        }
    }

    #[test]
    fn scenario_1_openai_cost() {
        let registry = PricingRegistry::new();
        registry
            .load(
                "openai",
                table_with(vec![("gpt-4o-mini", price("0.15", "0.6"))], vec![]),
            )
            .unwrap();
        let usage = Usage::new(1000, 500);
        let cost = registry.calculate("openai", "gpt-4o-mini", usage).unwrap();
        assert!((cost.cost_usd.as_f64() - 0.00045).abs() < 1e-9);
        assert_eq!(cost.source, CostSource::GatewayPricing);
    }

    #[test]
    fn scenario_5_family_pattern_resolution() {
        let registry = PricingRegistry::new();
        registry
            .load(
                "google",
                table_with(
                    vec![("gemini-1.5-pro", price("1.25", "5.0"))],
                    vec![FamilyPattern {
                        pattern: Regex::new(r"^gemini-1\.5-pro").unwrap(),
                        base_model: "gemini-1.5-pro".to_string(),
                        description: None,
                    }],
                ),
            )
            .unwrap();
        let unit = registry
            .get_unit_price("google", "gemini-1.5-pro-001")
            .unwrap();
        assert!((unit.prompt_price_per_mtok.as_f64() - 1.25).abs() < 1e-9);
    }

    #[test]
    fn is_model_supported_native_cost_always_true() {
        let registry = PricingRegistry::new();
        assert!(registry.is_model_supported("anything", "whatever-model", true));
    }

    #[test]
    fn is_model_supported_false_when_no_price() {
        let registry = PricingRegistry::new();
        registry
            .load("openai", table_with(vec![("gpt-4o-mini", price("0.15", "0.6"))], vec![]))
            .unwrap();
        assert!(!registry.is_model_supported("openai", "unknown-model", false));
    }

    #[test]
    fn load_rejects_family_pattern_with_unknown_base() {
        let registry = PricingRegistry::new();
        let result = registry.load(
            "google",
            table_with(
                vec![],
                vec![FamilyPattern {
                    pattern: Regex::new(r"^gemini").unwrap(),
                    base_model: "does-not-exist".to_string(),
                    description: None,
                }],
            ),
        );
        assert!(result.is_err());
    }

    #[test]
    fn multiplier_bounds_enforced() {
        let registry = PricingRegistry::new();
        assert!(registry.set_multiplier(0.0).is_err());
        assert!(registry.set_multiplier(2.5).is_err());
        assert!(registry.set_multiplier(1.1).is_ok());
    }

    #[test]
    fn reload_does_not_affect_captured_snapshot() {
        let registry = PricingRegistry::new();
        registry
            .load("openai", table_with(vec![("m", price("1.0", "1.0"))], vec![]))
            .unwrap();
        let snapshot = registry.snapshot("openai").unwrap();
        registry
            .reload("openai", table_with(vec![("m", price("2.0", "2.0"))], vec![]))
            .unwrap();
        // the old snapshot is untouched; Arc was not mutated in place.
        assert!((snapshot.models["m"].prompt_price_per_mtok.as_f64() - 1.0).abs() < 1e-9);
        let fresh = registry.snapshot("openai").unwrap();
        assert!((fresh.models["m"].prompt_price_per_mtok.as_f64() - 2.0).abs() < 1e-9);
    }
}
