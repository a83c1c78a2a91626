//! Domain model for multi-server MCP clients.
//!
//! Validated identifiers, server descriptors, connection states, tool
//! metadata, routing, and status snapshots. Nothing here performs I/O.

mod commands;
mod descriptor;
mod error;
mod ids;
mod routing;
mod settings;
mod state;
mod status;
mod tool;

pub use commands::{CommandSecrets, McpCommand, McpCommandsConfig};
pub use descriptor::{LocatorKind, SecretEnv, ServerDescriptor, ServerLocator, StdioLocator};
pub use error::{ClientDomainError, ParseConnectionStateError};
pub use ids::{AgentId, ServerName, SessionId};
pub use routing::{RoutingTable, TieBreakPolicy, ToolConflict};
pub use settings::ClientSettings;
pub use state::ConnectionState;
pub use status::{AgentStatus, ServerStatus};
pub use tool::{ToolDefinition, ToolDescriptor};
