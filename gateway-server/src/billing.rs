//! The billing hook: an external collaborator invoked once per completed
//! request with the final usage/cost. Failures are logged and never
//! surfaced to the caller — a billing outage must not take the gateway
//! down with it.

use async_trait::async_trait;
use gateway_core::models::{CostRecord, RequestMeta, RequestStats};

#[async_trait]
pub trait BillingHook: Send + Sync {
    async fn record(&self, meta: &RequestMeta, stats: &RequestStats, cost: Option<&CostRecord>);
}

/// Default hook: logs the billing event at `info` and does nothing else.
/// Real deployments inject a hook that posts to a payment/metering service.
pub struct LoggingBillingHook;

#[async_trait]
impl BillingHook for LoggingBillingHook {
    async fn record(&self, meta: &RequestMeta, stats: &RequestStats, cost: Option<&CostRecord>) {
        match cost {
            Some(cost) => tracing::info!(
                request_id = %meta.request_id,
                provider = %meta.target_provider,
                model = cost.model,
                cost_usd = cost.cost_usd.as_f64(),
                source = ?cost.source,
                "billed request"
            ),
            None => tracing::debug!(
                request_id = %meta.request_id,
                provider = %meta.target_provider,
                selected_model = ?stats.selected_model,
                "request completed with no billable cost"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::models::CostSource;
    use gateway_core::money::Money;

    #[tokio::test]
    async fn logging_hook_does_not_panic_on_missing_cost() {
        let hook = LoggingBillingHook;
        let meta = RequestMeta {
            request_id: "req-1".to_string(),
            method: "POST".to_string(),
            path: "/openai/chat/completions".to_string(),
            target_provider: "openai".to_string(),
            target_path: "/chat/completions".to_string(),
            caller_did: None,
            is_streaming: false,
            start: std::time::Instant::now(),
        };
        let stats = RequestStats::default();
        hook.record(&meta, &stats, None).await;

        let cost = CostRecord {
            cost_usd: Money::from_decimal_str("0.00045").unwrap(),
            source: CostSource::GatewayPricing,
            model: "gpt-4o-mini".to_string(),
            usage: None,
            pricing_version: None,
        };
        hook.record(&meta, &stats, Some(&cost)).await;
    }
}
