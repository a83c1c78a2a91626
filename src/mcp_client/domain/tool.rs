//! Tool metadata discovered during the handshake.

use super::{ClientDomainError, ServerName};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool metadata exactly as a server advertises it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    name: String,
    description: Option<String>,
    input_schema: Value,
}

impl ToolDefinition {
    /// Creates a tool definition.
    ///
    /// Blank descriptions are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ClientDomainError::EmptyToolName`] when the name is empty
    /// after trimming.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        input_schema: Value,
    ) -> Result<Self, ClientDomainError> {
        let normalized_name = name.into().trim().to_owned();
        if normalized_name.is_empty() {
            return Err(ClientDomainError::EmptyToolName);
        }

        let normalized_description = description
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty());

        Ok(Self {
            name: normalized_name,
            description: normalized_description,
            input_schema,
        })
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tool description, if the server supplied one.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the JSON schema for tool arguments.
    #[must_use]
    pub const fn input_schema(&self) -> &Value {
        &self.input_schema
    }
}

/// A discovered tool bound to the connection that advertised it.
///
/// The binding is by server name; the owning agent client resolves it to
/// the connection, so no descriptor holds a reference upward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    server: ServerName,
    definition: ToolDefinition,
}

impl ToolDescriptor {
    /// Binds a definition to its owning server.
    #[must_use]
    pub const fn new(server: ServerName, definition: ToolDefinition) -> Self {
        Self { server, definition }
    }

    /// Returns the owning server.
    #[must_use]
    pub const fn server(&self) -> &ServerName {
        &self.server
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Returns the tool description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.definition.description()
    }

    /// Returns the JSON schema for tool arguments.
    #[must_use]
    pub const fn input_schema(&self) -> &Value {
        self.definition.input_schema()
    }

    /// Returns the underlying definition.
    #[must_use]
    pub const fn definition(&self) -> &ToolDefinition {
        &self.definition
    }
}
