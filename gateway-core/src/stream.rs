//! Stream Transformer: `Initial -> Streaming -> Terminating -> Finalized`.
//!
//! The transformer does not own the actual byte-forwarding — that is a
//! transport concern (an axum streaming `Body` on the server side). Instead
//! the caller forwards each chunk verbatim downstream and calls
//! [`StreamTransformer::observe`] with the same bytes, in order, before or
//! after writing them. This keeps the transformer decoupled from any one
//! HTTP framework while still expressing the exact state machine in §4.3.

use crate::models::CostRecord;
use crate::money::Money;
use crate::pricing::PricingRegistry;
use crate::usage::UsageExtractor;
use crate::models::Usage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Initial,
    Streaming,
    Terminating,
    Finalized,
}

pub struct StreamTransformer<E: UsageExtractor> {
    state: StreamState,
    extractor: E,
    last_usage: Option<Usage>,
    provider_done_signal: bool,
}

impl<E: UsageExtractor> StreamTransformer<E> {
    pub fn new(extractor: E) -> Self {
        Self {
            state: StreamState::Initial,
            extractor,
            last_usage: None,
            provider_done_signal: false,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Feed one chunk, in the same order it is (or was) written downstream.
    /// Extracted usage overwrites any earlier partial usage, since streaming
    /// providers typically emit final counts only on the last frame.
    pub fn observe(&mut self, chunk: &[u8]) {
        if self.state == StreamState::Initial {
            self.state = StreamState::Streaming;
        }
        let outcome = self.extractor.feed_chunk(chunk);
        if let Some(usage) = outcome.usage {
            self.last_usage = Some(usage);
        }
        if outcome.done {
            self.provider_done_signal = true;
        }
    }

    pub fn provider_signalled_done(&self) -> bool {
        self.provider_done_signal
    }

    /// Upstream EOF, provider done-signal, or a client disconnect: drain
    /// whatever usage was already observed and move past `Streaming`.
    pub fn terminate(&mut self) {
        if self.state != StreamState::Finalized {
            self.state = StreamState::Terminating;
        }
    }

    pub fn last_usage(&self) -> Option<Usage> {
        self.last_usage
    }

    /// Produce the final cost record. `native_cost` is `Some` when the
    /// provider adapter exposed a provider-reported USD amount (e.g. a
    /// response header); in that case `source=provider` and the Pricing
    /// Registry is not consulted for the token math, only for the
    /// multiplier.
    pub fn finalize(
        &mut self,
        pricing: &PricingRegistry,
        provider: &str,
        model: &str,
        native_cost: Option<Money>,
    ) -> Option<CostRecord> {
        self.state = StreamState::Finalized;
        if let Some(amount) = native_cost {
            return Some(pricing.native_cost_record(model, amount, self.last_usage));
        }
        let usage = self.last_usage?;
        pricing.calculate(provider, model, usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CostSource, FamilyPattern, PricingTable, UnitPrice};
    use crate::usage::OpenAiUsageExtractor;
    use std::collections::HashMap;

    fn openai_table() -> PricingTable {
        let _: Vec<FamilyPattern> = vec![];
        let mut models = HashMap::new();
        models.insert(
            "gpt-4o-mini".to_string(),
            UnitPrice {
                prompt_price_per_mtok: Money::from_decimal_str("0.15").unwrap(),
                completion_price_per_mtok: Money::from_decimal_str("0.6").unwrap(),
                description: None,
            },
        );
        PricingTable {
            version: "v1".to_string(),
            models,
            family_patterns: vec![],
        }
    }

    #[test]
    fn scenario_4_usage_only_on_last_frame() {
        let registry = PricingRegistry::new();
        registry.load("openai", openai_table()).unwrap();

        let mut transformer = StreamTransformer::new(OpenAiUsageExtractor::new());
        assert_eq!(transformer.state(), StreamState::Initial);

        transformer.observe(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n");
        assert_eq!(transformer.state(), StreamState::Streaming);
        transformer.observe(b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n");
        transformer.observe(
            b"data: {\"choices\":[],\"usage\":{\"prompt_tokens\":20,\"completion_tokens\":30,\"total_tokens\":50}}\n\n",
        );
        transformer.observe(b"data: [DONE]\n\n");
        assert!(transformer.provider_signalled_done());

        transformer.terminate();
        assert_eq!(transformer.state(), StreamState::Terminating);

        let cost = transformer
            .finalize(&registry, "openai", "gpt-4o-mini", None)
            .unwrap();
        assert_eq!(transformer.state(), StreamState::Finalized);
        assert_eq!(cost.source, CostSource::GatewayPricing);
        assert_eq!(cost.usage, Some(Usage::new(20, 30)));
    }

    #[test]
    fn client_disconnect_keeps_partial_usage() {
        let registry = PricingRegistry::new();
        registry.load("openai", openai_table()).unwrap();

        let mut transformer = StreamTransformer::new(OpenAiUsageExtractor::new());
        transformer.observe(
            b"data: {\"choices\":[],\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":5,\"total_tokens\":10}}\n\n",
        );
        // client disconnects before [DONE]
        transformer.terminate();
        let cost = transformer
            .finalize(&registry, "openai", "gpt-4o-mini", None)
            .unwrap();
        assert_eq!(cost.usage, Some(Usage::new(5, 5)));
    }

    #[test]
    fn no_usage_observed_yields_no_cost() {
        let registry = PricingRegistry::new();
        registry.load("openai", openai_table()).unwrap();
        let mut transformer = StreamTransformer::new(OpenAiUsageExtractor::new());
        transformer.observe(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n");
        transformer.terminate();
        assert!(transformer
            .finalize(&registry, "openai", "gpt-4o-mini", None)
            .is_none());
    }

    #[test]
    fn scenario_2_native_cost_applies_multiplier_last() {
        let registry = PricingRegistry::new();
        registry.set_multiplier(1.10).unwrap();
        let mut transformer = StreamTransformer::new(OpenAiUsageExtractor::new());
        transformer.terminate();
        let cost = transformer
            .finalize(
                &registry,
                "openai",
                "gpt-4o-mini",
                Some(Money::from_decimal_str("1.23").unwrap()),
            )
            .unwrap();
        assert_eq!(cost.source, CostSource::Provider);
        assert!((cost.cost_usd.as_f64() - 1.353).abs() < 1e-9);
    }
}
