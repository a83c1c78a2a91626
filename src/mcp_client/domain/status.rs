//! Derived status snapshots for servers and agents.

use super::{AgentId, ConnectionState, ServerName, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of one server connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    server: ServerName,
    state: ConnectionState,
    last_error: Option<String>,
    tool_count: usize,
    session_id: Option<SessionId>,
    changed_at: DateTime<Utc>,
}

impl ServerStatus {
    /// Creates a server status snapshot.
    #[must_use]
    pub const fn new(
        server: ServerName,
        state: ConnectionState,
        changed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            server,
            state,
            last_error: None,
            tool_count: 0,
            session_id: None,
            changed_at,
        }
    }

    /// Records the most recent failure message.
    #[must_use]
    pub fn with_last_error(mut self, last_error: Option<String>) -> Self {
        self.last_error = last_error;
        self
    }

    /// Records the size of the discovered catalog.
    #[must_use]
    pub const fn with_tool_count(mut self, tool_count: usize) -> Self {
        self.tool_count = tool_count;
        self
    }

    /// Records the live session identifier.
    #[must_use]
    pub const fn with_session_id(mut self, session_id: Option<SessionId>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Returns the server name.
    #[must_use]
    pub const fn server(&self) -> &ServerName {
        &self.server
    }

    /// Returns the connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the most recent failure message.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns the number of tools the server advertised.
    #[must_use]
    pub const fn tool_count(&self) -> usize {
        self.tool_count
    }

    /// Returns the live session identifier.
    #[must_use]
    pub const fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    /// Returns when the state last changed.
    #[must_use]
    pub const fn changed_at(&self) -> DateTime<Utc> {
        self.changed_at
    }
}

/// Point-in-time roll-up of every server owned by one agent.
///
/// Recomputed on demand from the connections; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    agent: AgentId,
    servers: Vec<ServerStatus>,
    routed_tools: Vec<String>,
}

impl AgentStatus {
    /// Creates an agent roll-up from per-server snapshots.
    #[must_use]
    pub const fn new(agent: AgentId, servers: Vec<ServerStatus>, routed_tools: Vec<String>) -> Self {
        Self {
            agent,
            servers,
            routed_tools,
        }
    }

    /// Returns the agent identifier.
    #[must_use]
    pub const fn agent(&self) -> &AgentId {
        &self.agent
    }

    /// Returns per-server snapshots in configuration order.
    #[must_use]
    pub fn servers(&self) -> &[ServerStatus] {
        &self.servers
    }

    /// Returns the snapshot for one server.
    #[must_use]
    pub fn server(&self, name: &ServerName) -> Option<&ServerStatus> {
        self.servers.iter().find(|status| status.server() == name)
    }

    /// Returns routed tool names in sorted order.
    #[must_use]
    pub fn routed_tools(&self) -> &[String] {
        &self.routed_tools
    }

    /// Returns the number of configured servers.
    #[must_use]
    pub fn total_servers(&self) -> usize {
        self.servers.len()
    }

    /// Returns the number of servers in `Connected` state.
    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.count_in(ConnectionState::Connected)
    }

    /// Returns the number of servers in `Failed` state.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count_in(ConnectionState::Failed)
    }

    /// Returns whether at least one server can serve tool calls.
    #[must_use]
    pub fn has_usable_server(&self) -> bool {
        self.connected_count() > 0
    }

    fn count_in(&self, state: ConnectionState) -> usize {
        self.servers
            .iter()
            .filter(|status| status.state() == state)
            .count()
    }
}
