//! Agent tool-command configuration and its translation into descriptors.
//!
//! Agent configuration lists tool servers under `mcp_commands`. Each entry
//! names one launch target (a Python module, a Node module, or an arbitrary
//! command) plus optional settings. Translation keeps enabled entries in
//! configuration order and collapses repeated launch targets to their first
//! occurrence.

use super::{
    ClientDomainError, LocatorKind, SecretEnv, ServerDescriptor, ServerLocator, ServerName,
    StdioLocator,
};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// Resolved secrets keyed by server name or launch target.
pub type CommandSecrets = BTreeMap<String, BTreeMap<String, String>>;

/// The `mcp_commands` section of an agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpCommandsConfig {
    /// Tool server entries in configuration order.
    #[serde(default)]
    pub mcp_commands: Vec<McpCommand>,
}

/// One tool server entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpCommand {
    /// Disabled entries are skipped.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Explicit server name; derived from the launch target when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    /// Python module launched with the configured interpreter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_code_module: Option<String>,
    /// Node module launched with the configured runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_code_module: Option<String>,
    /// Arbitrary executable spoken to over STDIO.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Arguments for `command`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Non-secret environment for `command`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Opaque payload handed to the server at launch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    /// Per-server handshake timeout override in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
}

const fn enabled_by_default() -> bool {
    true
}

impl McpCommand {
    fn locator(&self, index: usize) -> Result<ServerLocator, ClientDomainError> {
        if let Some(module) = &self.python_code_module {
            return ServerLocator::python(module.as_str());
        }
        if let Some(module) = &self.node_code_module {
            return ServerLocator::node(module.as_str());
        }
        if let Some(command) = &self.command {
            let stdio = StdioLocator::new(command.as_str())?
                .with_args(self.args.iter().cloned())
                .with_env(self.env.clone());
            return Ok(ServerLocator::Stdio(stdio));
        }
        Err(ClientDomainError::MissingLaunchTarget { index })
    }

    fn name_for(&self, locator: &ServerLocator) -> Result<ServerName, ClientDomainError> {
        if let Some(explicit) = &self.server_name {
            return ServerName::new(explicit.as_str());
        }
        let hint = match locator {
            ServerLocator::Stdio(stdio) => stdio.args().last().map_or(stdio.command(), String::as_str),
            ServerLocator::Python { module } | ServerLocator::Node { module } => module.as_str(),
        };
        let path = Utf8Path::new(hint);
        ServerName::derive_from(path.file_stem().unwrap_or(hint))
    }
}

impl McpCommandsConfig {
    /// Translates enabled entries into server descriptors.
    ///
    /// Secrets are looked up by server name first, then by launch target.
    /// A launch target listed twice keeps its first entry.
    ///
    /// # Errors
    ///
    /// Returns [`ClientDomainError::MissingLaunchTarget`] for an entry with
    /// no launch form, [`ClientDomainError::DuplicateServerName`] when two
    /// distinct targets resolve to one name, or name validation errors.
    pub fn to_descriptors(
        &self,
        secrets: &CommandSecrets,
    ) -> Result<Vec<ServerDescriptor>, ClientDomainError> {
        let mut seen_targets: HashSet<(LocatorKind, String)> = HashSet::new();
        let mut seen_names: HashSet<ServerName> = HashSet::new();
        let mut descriptors = Vec::new();

        for (index, entry) in self.mcp_commands.iter().enumerate() {
            if !entry.enabled {
                continue;
            }
            let locator = entry.locator(index)?;
            let target_key = (locator.kind(), locator.target().to_owned());
            if !seen_targets.insert(target_key) {
                tracing::warn!(
                    index,
                    target = locator.target(),
                    "duplicate MCP launch target; keeping first occurrence"
                );
                continue;
            }

            let name = entry.name_for(&locator)?;
            if !seen_names.insert(name.clone()) {
                return Err(ClientDomainError::DuplicateServerName(name.to_string()));
            }

            let server_secrets: SecretEnv = secrets
                .get(name.as_str())
                .or_else(|| secrets.get(locator.target()))
                .map(|values| values.clone().into_iter().collect())
                .unwrap_or_default();

            let mut descriptor = ServerDescriptor::new(name, locator).with_secrets(server_secrets);
            if let Some(config) = &entry.config {
                descriptor = descriptor.with_config(config.clone());
            }
            if let Some(timeout_ms) = entry.connect_timeout_ms {
                descriptor = descriptor.with_connect_timeout(Duration::from_millis(timeout_ms));
            }
            descriptors.push(descriptor);
        }

        Ok(descriptors)
    }
}
