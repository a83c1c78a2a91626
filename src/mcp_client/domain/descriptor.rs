//! Server descriptors: where a tool-providing server lives and how to reach it.

use super::{ClientDomainError, ServerName};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Launch settings for an MCP server spoken to over process STDIO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioLocator {
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_directory: Option<String>,
}

impl StdioLocator {
    /// Creates a new STDIO locator.
    ///
    /// # Errors
    ///
    /// Returns [`ClientDomainError::EmptyStdioCommand`] when `command` is
    /// empty after trimming.
    pub fn new(command: impl Into<String>) -> Result<Self, ClientDomainError> {
        let normalized_command = command.into().trim().to_owned();
        if normalized_command.is_empty() {
            return Err(ClientDomainError::EmptyStdioCommand);
        }

        Ok(Self {
            command: normalized_command,
            args: Vec::new(),
            env: BTreeMap::new(),
            working_directory: None,
        })
    }

    /// Replaces command-line arguments.
    #[must_use]
    pub fn with_args(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.args = values.into_iter().collect();
        self
    }

    /// Replaces non-secret environment variables.
    #[must_use]
    pub fn with_env(mut self, values: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env = values.into_iter().collect();
        self
    }

    /// Sets an explicit working directory; blank values are ignored.
    #[must_use]
    pub fn with_working_directory(mut self, value: impl Into<String>) -> Self {
        let normalized = value.into().trim().to_owned();
        self.working_directory = (!normalized.is_empty()).then_some(normalized);
        self
    }

    /// Returns the executable command.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns command-line arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns non-secret environment variables.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Returns the optional working directory.
    #[must_use]
    pub fn working_directory(&self) -> Option<&str> {
        self.working_directory.as_deref()
    }
}

/// Discriminant used to pick a session connector for a locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    /// Arbitrary command over STDIO.
    Stdio,
    /// Python server module.
    Python,
    /// Node server module.
    Node,
}

impl LocatorKind {
    /// Returns the canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Python => "python",
            Self::Node => "node",
        }
    }
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Where a tool-providing server lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "config")]
pub enum ServerLocator {
    /// Arbitrary command spoken to over STDIO.
    Stdio(StdioLocator),
    /// Python module file, launched with the configured interpreter.
    Python {
        /// Module path, absolute or relative to the connector base directory.
        module: String,
    },
    /// Node module file.
    Node {
        /// Module path, absolute or relative to the connector base directory.
        module: String,
    },
}

impl ServerLocator {
    /// Creates a `stdio` locator.
    ///
    /// # Errors
    ///
    /// Returns validation errors from [`StdioLocator::new`].
    pub fn stdio(command: impl Into<String>) -> Result<Self, ClientDomainError> {
        Ok(Self::Stdio(StdioLocator::new(command)?))
    }

    /// Creates a Python module locator.
    ///
    /// # Errors
    ///
    /// Returns [`ClientDomainError::EmptyModulePath`] for a blank path.
    pub fn python(module: impl Into<String>) -> Result<Self, ClientDomainError> {
        Ok(Self::Python {
            module: normalize_module(module)?,
        })
    }

    /// Creates a Node module locator.
    ///
    /// # Errors
    ///
    /// Returns [`ClientDomainError::EmptyModulePath`] for a blank path.
    pub fn node(module: impl Into<String>) -> Result<Self, ClientDomainError> {
        Ok(Self::Node {
            module: normalize_module(module)?,
        })
    }

    /// Returns the discriminant used for connector lookup.
    #[must_use]
    pub const fn kind(&self) -> LocatorKind {
        match self {
            Self::Stdio(_) => LocatorKind::Stdio,
            Self::Python { .. } => LocatorKind::Python,
            Self::Node { .. } => LocatorKind::Node,
        }
    }

    /// Returns the text identifying the launch target: the module path or
    /// the command.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::Stdio(stdio) => stdio.command(),
            Self::Python { module } | Self::Node { module } => module,
        }
    }
}

fn normalize_module(module: impl Into<String>) -> Result<String, ClientDomainError> {
    let normalized = module.into().trim().to_owned();
    if normalized.is_empty() {
        return Err(ClientDomainError::EmptyModulePath);
    }
    Ok(normalized)
}

/// Already-resolved credentials handed to a server as environment variables.
///
/// Values never appear in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretEnv(BTreeMap<String, String>);

impl SecretEnv {
    /// Creates an empty secret set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns whether no secrets are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over variable names and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl FromIterator<(String, String)> for SecretEnv {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Debug for SecretEnv {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_map()
            .entries(self.0.keys().map(|key| (key, "<redacted>")))
            .finish()
    }
}

/// Immutable description of one tool-providing server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerDescriptor {
    name: ServerName,
    locator: ServerLocator,
    config: Option<Value>,
    secrets: SecretEnv,
    connect_timeout: Option<Duration>,
}

impl ServerDescriptor {
    /// Creates a descriptor with no config payload, secrets, or timeout
    /// override.
    #[must_use]
    pub const fn new(name: ServerName, locator: ServerLocator) -> Self {
        Self {
            name,
            locator,
            config: None,
            secrets: SecretEnv::new(),
            connect_timeout: None,
        }
    }

    /// Attaches a per-server configuration payload.
    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    /// Attaches resolved secrets.
    #[must_use]
    pub fn with_secrets(mut self, secrets: SecretEnv) -> Self {
        self.secrets = secrets;
        self
    }

    /// Overrides the handshake timeout for this server.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Returns the server name.
    #[must_use]
    pub const fn name(&self) -> &ServerName {
        &self.name
    }

    /// Returns the locator.
    #[must_use]
    pub const fn locator(&self) -> &ServerLocator {
        &self.locator
    }

    /// Returns the optional configuration payload.
    #[must_use]
    pub const fn config(&self) -> Option<&Value> {
        self.config.as_ref()
    }

    /// Returns the resolved secrets.
    #[must_use]
    pub const fn secrets(&self) -> &SecretEnv {
        &self.secrets
    }

    /// Returns the handshake timeout override, if any.
    #[must_use]
    pub const fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }
}
