//! Session ports: one live MCP session and the factory that opens it.

use crate::mcp_client::domain::{LocatorKind, ServerDescriptor, ToolDefinition};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// One established protocol session with a tool-providing server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait McpSession: Send + Sync {
    /// Lists every tool the server advertises.
    async fn list_tools(&self) -> SessionResult<Vec<ToolDefinition>>;

    /// Invokes one tool and returns the server's result payload verbatim.
    async fn call_tool(&self, name: &str, arguments: Value) -> SessionResult<Value>;

    /// Ends the session and releases its resources.
    async fn close(&self) -> SessionResult<()>;
}

/// Opens sessions for server descriptors.
///
/// `open` covers transport setup and the protocol handshake; catalog
/// discovery is a separate [`McpSession::list_tools`] call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Opens and initializes a session.
    async fn open(&self, descriptor: &ServerDescriptor) -> SessionResult<Arc<dyn McpSession>>;
}

/// Errors returned by session adapters.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The server process or module could not be started.
    #[error("failed to launch MCP server: {0}")]
    Spawn(String),

    /// Reading from or writing to the transport failed.
    #[error("MCP transport error: {0}")]
    Transport(String),

    /// The server answered with a JSON-RPC error.
    #[error("MCP server returned error {code}: {message}")]
    Protocol {
        /// JSON-RPC error code.
        code: i64,
        /// Server-supplied message.
        message: String,
    },

    /// The server spoke an unexpected protocol revision or shape.
    #[error("MCP protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// No connector handles this locator kind.
    #[error("no session connector for locator kind {0}")]
    UnsupportedLocator(LocatorKind),

    /// The session has ended.
    #[error("MCP session is closed")]
    Closed,

    /// An adapter-enforced deadline elapsed.
    #[error("MCP operation deadline elapsed")]
    DeadlineElapsed,

    /// Generic adapter failure.
    #[error("MCP session runtime error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl SessionError {
    /// Wraps an adapter error.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}
