//! MCP over process STDIO.

mod protocol;
mod session;
mod transport;

pub use session::{SERVER_CONFIG_ENV, StdioConnector};
