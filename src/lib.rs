//! Switchyard: multi-server MCP client for agent platforms.
//!
//! Each agent is configured with several tool-providing servers spoken to
//! over the Model Context Protocol. This crate connects to all of them
//! concurrently with a bounded number of handshakes in flight, merges their
//! tool catalogs into one routing table, routes tool calls by name, and
//! reports per-server health. A server that fails to connect never blocks
//! its siblings; its tools are simply absent.
//!
//! # Architecture
//!
//! Switchyard follows hexagonal architecture principles:
//!
//! - **Domain**: Pure values and rules with no I/O
//! - **Ports**: Session contracts implemented by transports
//! - **Adapters**: STDIO child processes, in-memory scripted servers, and
//!   configuration files
//! - **Services**: Connections, agent clients, and the client registry
//!
//! # Modules
//!
//! - [`mcp_client`]: Multi-server MCP client and agent registry
//! - [`telemetry`]: Tracing subscriber installation

pub mod mcp_client;
pub mod telemetry;
