//! Error types for MCP client domain validation.

use thiserror::Error;

/// Errors returned while constructing MCP client domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientDomainError {
    /// The agent identifier is empty after trimming.
    #[error("agent identifier must not be empty")]
    EmptyAgentId,

    /// The agent identifier exceeds the 100-character limit.
    #[error("agent identifier exceeds 100 character limit: {0}")]
    AgentIdTooLong(String),

    /// The server name is empty after trimming.
    #[error("MCP server name must not be empty")]
    EmptyServerName,

    /// The server name contains characters outside `[a-z0-9_]`.
    #[error(
        "MCP server name '{0}' contains invalid characters (only lowercase alphanumeric and underscores allowed)"
    )]
    InvalidServerName(String),

    /// The server name exceeds the 100-character limit.
    #[error("MCP server name exceeds 100 character limit: {0}")]
    ServerNameTooLong(String),

    /// The STDIO command is empty.
    #[error("STDIO command must not be empty")]
    EmptyStdioCommand,

    /// A module path is empty after trimming.
    #[error("server module path must not be empty")]
    EmptyModulePath,

    /// A tool definition name is empty after trimming.
    #[error("tool name must not be empty")]
    EmptyToolName,

    /// Two descriptors for the same agent share a server name.
    #[error("duplicate MCP server name for one agent: {0}")]
    DuplicateServerName(String),

    /// A tool command entry names none of the supported launch forms.
    #[error("MCP command entry {index} has no launch target")]
    MissingLaunchTarget {
        /// Zero-based position in the `mcp_commands` list.
        index: usize,
    },

    /// Transitioning between two connection states is invalid.
    #[error("invalid connection state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// Current connection state.
        from: String,
        /// Requested target state.
        to: String,
    },
}

/// Error returned while parsing a connection state from text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown connection state: {0}")]
pub struct ParseConnectionStateError(pub String);
