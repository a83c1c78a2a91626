//! Multi-server MCP client for agents.
//!
//! Each agent owns one [`services::MultiServerClient`] that connects to all
//! of its configured tool servers with bounded concurrency, routes tool
//! calls by name, and reports per-server state. The
//! [`services::ClientRegistry`] owns every agent's client and is the only
//! surface the rest of the platform uses. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;

pub use error::{McpClientError, McpClientResult};
