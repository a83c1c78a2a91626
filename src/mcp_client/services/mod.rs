//! Orchestration services for connections, agent clients, and the registry.

mod client;
mod connection;
mod registry;

pub use client::{ConnectReport, MultiServerClient, TeardownReport};
pub use connection::ServerConnection;
pub use registry::{ClientRegistry, ShutdownReport};
