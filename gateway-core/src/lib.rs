//! # Gateway Core
//!
//! The transport-agnostic heart of the LLM gateway: a decimal-safe Pricing
//! Registry, per-provider streaming Usage Extractors, a Stream Transformer
//! state machine, Provider Adapters that shape requests/responses for each
//! upstream, and MCP upstream clients speaking JSON-RPC over stdio or HTTP
//! streaming.
//!
//! This crate has no HTTP server dependency (no axum) — `gateway-server`
//! wires these pieces into an axum router, a config loader and a CLI
//! entrypoint.
//!
//! ## Layout
//!
//! - [`money`] — fixed-point USD arithmetic used everywhere a dollar amount
//!   is computed, never `f64`.
//! - [`models`] — shared typed structs: [`models::Usage`],
//!   [`models::PricingTable`], [`models::ProviderRecord`], request-scoped
//!   [`models::RequestMeta`]/[`models::RequestStats`], MCP
//!   [`models::RouteRule`].
//! - [`pricing`] — the Pricing Registry: loads per-provider
//!   [`models::PricingTable`]s, resolves family-pattern fallbacks, computes
//!   [`models::CostRecord`]s.
//! - [`usage`] — the [`usage::UsageExtractor`] trait and the OpenAI/
//!   Anthropic/Google implementations.
//! - [`stream`] — [`stream::StreamTransformer`], the
//!   `Initial -> Streaming -> Terminating -> Finalized` state machine tying
//!   an extractor to the Pricing Registry.
//! - [`providers`] — [`providers::ProviderAdapter`] and the built-in
//!   adapters.
//! - [`mcp`] — MCP upstream clients and JSON-RPC framing.
//! - [`error`] — the error enums every layer above returns.

pub mod common;
pub mod error;
pub mod mcp;
pub mod models;
pub mod money;
pub mod pricing;
pub mod providers;
pub mod stream;
pub mod usage;

pub use error::{McpError, PricingError, ProviderError, UsageError};
pub use models::{CostRecord, CostSource, ProviderRecord, RequestMeta, RequestStats, Usage};
pub use money::Money;
pub use pricing::PricingRegistry;
pub use providers::{create_adapter, ProviderAdapter};
pub use stream::{StreamState, StreamTransformer};
pub use usage::UsageExtractor;
