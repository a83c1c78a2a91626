//! Identifier and validated-name types for agents, servers, and sessions.

use super::ClientDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length for agent identifiers and server names.
const MAX_NAME_LENGTH: usize = 100;

/// Identifier of a logical agent owning one aggregated tool surface.
///
/// Agent identifiers keep their original casing (`Kairos` and `kairos` are
/// different agents); only surrounding whitespace is removed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(String);

impl AgentId {
    /// Creates a validated agent identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ClientDomainError::EmptyAgentId`] for blank input and
    /// [`ClientDomainError::AgentIdTooLong`] above 100 characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ClientDomainError> {
        let trimmed = value.into().trim().to_owned();
        if trimmed.is_empty() {
            return Err(ClientDomainError::EmptyAgentId);
        }
        if trimmed.chars().count() > MAX_NAME_LENGTH {
            return Err(ClientDomainError::AgentIdTooLong(trimmed));
        }
        Ok(Self(trimmed))
    }

    /// Returns the agent identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AgentId {
    type Error = ClientDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AgentId> for String {
    fn from(value: AgentId) -> Self {
        value.0
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Validated MCP server name, unique within one agent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerName(String);

impl ServerName {
    /// Creates a validated server name.
    ///
    /// The input is trimmed and lowercased. Only characters in `[a-z0-9_]`
    /// are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ClientDomainError`] when validation fails.
    pub fn new(value: impl Into<String>) -> Result<Self, ClientDomainError> {
        let normalized = value.into().trim().to_ascii_lowercase();

        if normalized.is_empty() {
            return Err(ClientDomainError::EmptyServerName);
        }

        let is_valid = normalized.chars().all(|character| {
            character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
        });
        if !is_valid {
            return Err(ClientDomainError::InvalidServerName(normalized));
        }

        if normalized.len() > MAX_NAME_LENGTH {
            return Err(ClientDomainError::ServerNameTooLong(normalized));
        }

        Ok(Self(normalized))
    }

    /// Derives a server name from free text such as a module file stem.
    ///
    /// Every character outside `[a-z0-9_]` becomes `_` and leading or
    /// trailing underscores are dropped before validation.
    ///
    /// # Errors
    ///
    /// Returns [`ClientDomainError`] when nothing usable remains.
    pub fn derive_from(hint: &str) -> Result<Self, ClientDomainError> {
        let replaced: String = hint
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|character| {
                if character.is_ascii_lowercase() || character.is_ascii_digit() {
                    character
                } else {
                    '_'
                }
            })
            .collect();
        Self::new(replaced.trim_matches('_'))
    }

    /// Returns the server name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ServerName {
    type Error = ClientDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServerName> for String {
    fn from(value: ServerName) -> Self {
        value.0
    }
}

impl AsRef<str> for ServerName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identifier of one established session; a reconnect yields a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}
