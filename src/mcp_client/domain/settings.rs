//! Operational settings shared by every agent client.

use super::TieBreakPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_MAX_CONCURRENT_CONNECTIONS: usize = 5;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_TEARDOWN_TIMEOUT_MS: u64 = 10_000;

/// Connection, routing, and teardown settings.
///
/// Serialized with millisecond fields so agent configuration files can
/// carry it directly; missing fields take the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    max_concurrent_connections: usize,
    connect_timeout_ms: u64,
    call_timeout_ms: Option<u64>,
    teardown_timeout_ms: u64,
    tie_break: TieBreakPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            max_concurrent_connections: DEFAULT_MAX_CONCURRENT_CONNECTIONS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            call_timeout_ms: None,
            teardown_timeout_ms: DEFAULT_TEARDOWN_TIMEOUT_MS,
            tie_break: TieBreakPolicy::FirstConnected,
        }
    }
}

impl ClientSettings {
    /// Sets the number of handshakes allowed in flight at once.
    ///
    /// Zero is stored as one.
    #[must_use]
    pub fn with_max_concurrent_connections(mut self, limit: usize) -> Self {
        self.max_concurrent_connections = limit.max(1);
        self
    }

    /// Sets the default handshake timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = duration_to_millis(timeout);
        self
    }

    /// Sets a deadline applied to every tool call.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = Some(duration_to_millis(timeout));
        self
    }

    /// Sets the per-agent bound used during registry shutdown.
    #[must_use]
    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout_ms = duration_to_millis(timeout);
        self
    }

    /// Sets the duplicate tool-name policy.
    #[must_use]
    pub const fn with_tie_break(mut self, tie_break: TieBreakPolicy) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Returns the number of handshakes allowed in flight at once.
    #[must_use]
    pub fn max_concurrent_connections(&self) -> usize {
        self.max_concurrent_connections.max(1)
    }

    /// Returns the default handshake timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the tool-call deadline, if one is configured.
    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }

    /// Returns the per-agent teardown bound.
    #[must_use]
    pub const fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }

    /// Returns the duplicate tool-name policy.
    #[must_use]
    pub const fn tie_break(&self) -> TieBreakPolicy {
        self.tie_break
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
