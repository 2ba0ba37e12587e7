//! Request Orchestrator: steps 4-9 of the pipeline described in the
//! component design (auth, routing and path validation happen one layer up,
//! in [`crate::server`], since they need axum extractors). From here on:
//! parse the model, gate on pricing support, forward through the chosen
//! [`ProviderAdapter`], extract usage/cost, invoke the billing hook, and
//! record stage timings.

use async_stream::stream;
use bytes::Bytes;
use futures::StreamExt;
use gateway_core::models::{CostRecord, ProviderRecord, RequestMeta, RequestStats};
use gateway_core::pricing::PricingRegistry;
use gateway_core::providers::{self, ProviderAdapter};
use gateway_core::stream::StreamTransformer;
use reqwest::{header::HeaderMap, Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::billing::BillingHook;
use crate::gateway_error::GatewayError;

pub struct Orchestrator {
    client: reqwest::Client,
    pricing: Arc<PricingRegistry>,
    billing: Arc<dyn BillingHook>,
}

impl Orchestrator {
    pub fn new(client: reqwest::Client, pricing: Arc<PricingRegistry>, billing: Arc<dyn BillingHook>) -> Self {
        Self {
            client,
            pricing,
            billing,
        }
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Step 4: pull `model` out of the request body without fully buffering
    /// a streamed upload. 400 `model_not_supported` with the exact "Model
    /// not specified" message when it's absent.
    pub fn extract_model(body: Option<&Value>) -> Result<String, GatewayError> {
        body.and_then(|v| v.get("model"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::ModelNotSupported {
                message: "Model not specified".to_string(),
            })
    }

    fn gate_pricing(&self, record: &ProviderRecord, model: &str) -> Result<(), GatewayError> {
        if self
            .pricing
            .is_model_supported(&record.name, model, record.supports_native_usd_cost)
        {
            Ok(())
        } else {
            Err(GatewayError::ModelNotSupported {
                message: format!("model '{model}' is not supported by provider '{}'", record.name),
            })
        }
    }

    /// Non-streaming path: forward, buffer the response, extract usage
    /// once, compute cost, invoke the billing hook.
    pub async fn handle_buffered(
        &self,
        meta: &RequestMeta,
        stats: &mut RequestStats,
        record: &ProviderRecord,
        adapter: &dyn ProviderAdapter,
        incoming_body: Option<Value>,
    ) -> Result<(StatusCode, HeaderMap, Bytes), GatewayError> {
        let model = Self::extract_model(incoming_body.as_ref())?;
        self.gate_pricing(record, &model)?;
        stats.selected_model = Some(model.clone());

        let upstream_started = Instant::now();
        let (status, headers, body) = providers::execute_request(
            &self.client,
            record,
            adapter,
            Method::POST,
            &meta.target_path,
            incoming_body,
        )
        .await?;
        stats.upstream_latency = Some(upstream_started.elapsed());
        stats.record_stage("upstream", upstream_started.elapsed());

        if status.is_success() {
            if let Ok(body_json) = serde_json::from_slice::<Value>(&body) {
                let parsed = adapter.parse_response(&headers, &body_json);
                stats.usage = parsed.usage;
                let cost = self.cost_record(record, &model, parsed.usage, parsed.native_cost_usd);
                self.apply_cost(stats, &cost);
                self.billing.record(meta, stats, cost.as_ref()).await;
            }
        }
        Ok((status, headers, body))
    }

    /// Streaming path: forwards bytes to the caller as they arrive while
    /// feeding the same bytes to a [`StreamTransformer`]; invokes the
    /// billing hook once the upstream stream ends (EOF or disconnect).
    pub async fn handle_streaming(
        &self,
        meta: RequestMeta,
        mut stats: RequestStats,
        record: ProviderRecord,
        adapter: Box<dyn ProviderAdapter>,
        incoming_body: Option<Value>,
    ) -> Result<(StatusCode, HeaderMap, impl futures::Stream<Item = Result<Bytes, std::io::Error>>), GatewayError> {
        let model = Self::extract_model(incoming_body.as_ref())?;
        self.gate_pricing(&record, &model)?;
        stats.selected_model = Some(model.clone());

        let response = providers::execute_stream_request(
            &self.client,
            &record,
            adapter.as_ref(),
            Method::POST,
            &meta.target_path,
            incoming_body,
        )
        .await?;
        let status = response.status();
        let headers = response.headers().clone();

        let pricing = self.pricing.clone();
        let billing = self.billing.clone();
        let mut transformer = StreamTransformer::new(adapter.usage_extractor());

        let body_stream = stream! {
            let mut upstream = response.bytes_stream();
            loop {
                match upstream.next().await {
                    Some(Ok(chunk)) => {
                        transformer.observe(&chunk);
                        yield Ok(chunk);
                    }
                    Some(Err(error)) => {
                        tracing::warn!(request_id = %meta.request_id, %error, "upstream stream error");
                        transformer.terminate();
                        let frame = serde_json::json!({
                            "error": {
                                "message": error.to_string(),
                                "type": "upstream_error",
                                "code": "upstream_error",
                            }
                        });
                        yield Ok(Bytes::from(format!("event: error\ndata: {frame}\n\n")));
                        break;
                    }
                    None => {
                        transformer.terminate();
                        break;
                    }
                }
            }
            let cost = transformer.finalize(&pricing, &record.name, &model, None);
            stats.usage = transformer.last_usage();
            if let Some(cost) = &cost {
                stats.cost = Some(cost.cost_usd);
                stats.cost_source = Some(cost.source);
            }
            billing.record(&meta, &stats, cost.as_ref()).await;
        };

        Ok((status, headers, body_stream))
    }

    fn cost_record(
        &self,
        record: &ProviderRecord,
        model: &str,
        usage: Option<gateway_core::models::Usage>,
        native_cost_usd: Option<gateway_core::money::Money>,
    ) -> Option<CostRecord> {
        if let Some(native) = native_cost_usd {
            return Some(self.pricing.native_cost_record(model, native, usage));
        }
        usage.and_then(|usage| self.pricing.calculate(&record.name, model, usage))
    }

    fn apply_cost(&self, stats: &mut RequestStats, cost: &Option<CostRecord>) {
        if let Some(cost) = cost {
            stats.cost = Some(cost.cost_usd);
            stats.cost_source = Some(cost.source);
        }
    }
}
