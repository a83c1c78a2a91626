//! Service-level errors for connections, agent clients, and the registry.

use crate::mcp_client::{
    domain::{AgentId, ClientDomainError, ConnectionState, ServerName},
    ports::SessionError,
};
use std::time::Duration;
use thiserror::Error;

/// Result type for MCP client service operations.
pub type McpClientResult<T> = Result<T, McpClientError>;

/// Errors returned by MCP client services.
#[derive(Debug, Clone, Error)]
pub enum McpClientError {
    /// The handshake did not finish within its timeout.
    #[error("connecting to MCP server {server} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Server name.
        server: ServerName,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The handshake failed.
    #[error("connecting to MCP server {server} failed: {source}")]
    ConnectFailed {
        /// Server name.
        server: ServerName,
        /// Underlying session error.
        source: SessionError,
    },

    /// The connection is not in `Connected` state.
    #[error("MCP server {server} is not connected (state: {state})")]
    NotConnected {
        /// Server name.
        server: ServerName,
        /// Current state.
        state: ConnectionState,
    },

    /// No connected server advertises the tool.
    #[error("unknown tool: {tool}")]
    UnknownTool {
        /// Requested tool name.
        tool: String,
    },

    /// The server failed to execute the tool.
    #[error("tool {tool} on MCP server {server} failed: {source}")]
    CallFailed {
        /// Server name.
        server: ServerName,
        /// Tool name.
        tool: String,
        /// Underlying session error.
        source: SessionError,
    },

    /// A registry entry already exists for the agent.
    #[error("agent already registered: {0}")]
    AlreadyExists(AgentId),

    /// No registry entry exists for the agent.
    #[error("agent not found: {0}")]
    NotFound(AgentId),

    /// The agent client has no server with this name.
    #[error("unknown MCP server: {0}")]
    UnknownServer(ServerName),

    /// Releasing a session failed.
    #[error("closing MCP server {server} failed: {source}")]
    CloseFailed {
        /// Server name.
        server: ServerName,
        /// Underlying session error.
        source: SessionError,
    },

    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] ClientDomainError),
}
