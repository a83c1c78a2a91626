//! Port contracts for MCP sessions.

pub mod session;

pub use session::{McpSession, SessionConnector, SessionError, SessionResult};
