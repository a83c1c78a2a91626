//! Connection lifecycle state.

use super::{ClientDomainError, ParseConnectionStateError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one server connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session; initial state and the state after `close`.
    Disconnected,
    /// A handshake is in flight.
    Connecting,
    /// The session is established and the catalog is known.
    Connected,
    /// The last handshake failed; terminal until a reconnect attempt.
    Failed,
}

impl ConnectionState {
    /// Returns the canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }

    /// Returns whether tools may be listed or called in this state.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns whether transition to `target` is allowed.
    ///
    /// Any state may move to `Disconnected` (close is unconditional) and any
    /// settled state may start a new handshake.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (_, Self::Disconnected)
                | (
                    Self::Disconnected | Self::Connected | Self::Failed,
                    Self::Connecting
                )
                | (Self::Connecting, Self::Connected | Self::Failed)
        )
    }

    /// Validates a transition to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientDomainError::InvalidStateTransition`] when the
    /// transition is not allowed.
    pub fn transition_to(self, target: Self) -> Result<Self, ClientDomainError> {
        if self.can_transition_to(target) {
            return Ok(target);
        }
        Err(ClientDomainError::InvalidStateTransition {
            from: self.as_str().to_owned(),
            to: target.as_str().to_owned(),
        })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ConnectionState {
    type Error = ParseConnectionStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "disconnected" => Ok(Self::Disconnected),
            "connecting" => Ok(Self::Connecting),
            "connected" => Ok(Self::Connected),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseConnectionStateError(value.to_owned())),
        }
    }
}
