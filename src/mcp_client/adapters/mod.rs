//! Adapter implementations for the session port and configuration loading.

pub mod config_file;
pub mod connectors;
pub mod memory;
pub mod stdio;

pub use config_file::{ConfigFileError, ConfigFileLoader};
pub use connectors::ConnectorRegistry;
pub use memory::{InMemoryConnector, ScriptedServer};
pub use stdio::StdioConnector;
