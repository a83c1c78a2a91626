//! Shared helpers for in-memory MCP client integration tests.

use mockable::DefaultClock;
use rstest::fixture;
use serde_json::json;
use std::sync::Arc;
use switchyard::mcp_client::{
    adapters::{InMemoryConnector, ScriptedServer},
    domain::{AgentId, ClientSettings, ServerDescriptor, ServerLocator, ServerName, ToolDefinition},
    services::ClientRegistry,
};

/// Registry type used across in-memory tests.
pub type TestRegistry = ClientRegistry<DefaultClock>;

/// Connector and registry sharing scripted servers.
pub struct Harness {
    /// Scripted connector observed by assertions.
    pub connector: InMemoryConnector,
    /// Registry under test.
    pub registry: Arc<TestRegistry>,
}

impl Harness {
    /// Scripts `name` to accept and advertise `tool_names`.
    pub fn serve(&self, name: &str, tool_names: &[&str]) {
        let catalog = tool_names.iter().map(|tool| definition(tool)).collect();
        self.script(name, ScriptedServer::new().with_tools(catalog));
    }

    /// Scripts `name` with a custom behaviour.
    pub fn script(&self, name: &str, server: ScriptedServer) {
        self.connector
            .script(server_name(name), server)
            .expect("script should be stored");
    }
}

/// Provides a registry over a fresh in-memory connector.
#[fixture]
pub fn harness() -> Harness {
    let connector = InMemoryConnector::new();
    let registry = Arc::new(ClientRegistry::new(
        Arc::new(connector.clone()),
        Arc::new(DefaultClock),
        ClientSettings::default(),
    ));
    Harness {
        connector,
        registry,
    }
}

/// Builds a valid server name.
pub fn server_name(raw: &str) -> ServerName {
    ServerName::new(raw).expect("valid server name")
}

/// Builds a valid agent identifier.
pub fn agent(raw: &str) -> AgentId {
    AgentId::new(raw).expect("valid agent id")
}

/// Builds a tool definition with an empty object schema.
pub fn definition(name: &str) -> ToolDefinition {
    ToolDefinition::new(name, None, json!({"type": "object"})).expect("valid tool definition")
}

/// Builds a STDIO descriptor for `name`.
pub fn descriptor(name: &str) -> ServerDescriptor {
    ServerDescriptor::new(
        server_name(name),
        ServerLocator::stdio(format!("{name}-mcp")).expect("valid locator"),
    )
}
