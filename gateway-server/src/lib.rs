//! Gateway Server: the axum HTTP process that wires `gateway-core`'s
//! provider adapters, pricing registry and MCP upstream clients into a
//! reverse proxy with request auth, path validation, billing hooks and an
//! admin surface.
//!
//! `gateway-core` has no knowledge of HTTP; everything transport-specific —
//! route wiring, the `DIDAuthV1` auth gate, configuration loading, the CLI
//! entrypoint — lives here.

pub mod auth;
pub mod billing;
pub mod config;
pub mod gateway_error;
pub mod mcp_handler;
pub mod mcp_registry;
pub mod orchestrator;
pub mod router;
pub mod server;

pub use server::create_server;
