//! Unit tests for connections, agent clients, and the registry.


use crate::mcp_client::domain::{ServerDescriptor, ServerLocator, ServerName, ToolDefinition};
use serde_json::json;

pub(super) fn server_name(raw: &str) -> ServerName {
    ServerName::new(raw).expect("valid server name")
}

pub(super) fn tool(name: &str) -> ToolDefinition {
    ToolDefinition::new(
        name,
        Some(format!("{name} test tool")),
        json!({"type": "object"}),
    )
    .expect("valid tool definition")
}

pub(super) fn tools(names: &[&str]) -> Vec<ToolDefinition> {
    names.iter().map(|name| tool(name)).collect()
}

pub(super) fn descriptor(name: &str) -> ServerDescriptor {
    ServerDescriptor::new(
        server_name(name),
        ServerLocator::stdio(format!("{name}-server")).expect("valid locator"),
    )
}
