//! Tool-name routing for one agent.

use super::ServerName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Precedence rule when several connected servers advertise one tool name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakPolicy {
    /// The server that finished connecting first keeps the name.
    #[default]
    FirstConnected,
    /// The server listed first in configuration keeps the name.
    ConfigurationOrder,
}

impl TieBreakPolicy {
    /// Returns the canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstConnected => "first_connected",
            Self::ConfigurationOrder => "configuration_order",
        }
    }
}

impl fmt::Display for TieBreakPolicy {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A tool name advertised by more than one connected server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConflict {
    /// Contested tool name.
    pub tool: String,
    /// Server the name routes to.
    pub winner: ServerName,
    /// Servers whose copy is shadowed.
    pub shadowed: Vec<ServerName>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ServerCatalog {
    server: ServerName,
    configuration_index: usize,
    tools: Vec<String>,
}

/// Mapping from tool name to the connected server that serves it.
///
/// The table is a value: every change produces a new table, so a holder
/// swapping it behind a lock publishes each update in one step. Catalogs
/// are kept in precedence order and the name map is rebuilt from them, so
/// removing a server hands contested names to the next server offering
/// them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    policy: TieBreakPolicy,
    catalogs: Vec<ServerCatalog>,
    routes: HashMap<String, ServerName>,
}

impl RoutingTable {
    /// Creates an empty table using `policy` for duplicate names.
    #[must_use]
    pub fn new(policy: TieBreakPolicy) -> Self {
        Self {
            policy,
            catalogs: Vec::new(),
            routes: HashMap::new(),
        }
    }

    /// Returns the tie-break policy.
    #[must_use]
    pub const fn policy(&self) -> TieBreakPolicy {
        self.policy
    }

    /// Returns a table where `server` serves `tools`, replacing any entries
    /// it had before.
    ///
    /// `configuration_index` is the descriptor position and only matters
    /// under [`TieBreakPolicy::ConfigurationOrder`]; otherwise the server is
    /// ranked after every server already present.
    #[must_use]
    pub fn with_server(
        &self,
        server: &ServerName,
        configuration_index: usize,
        tools: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut catalogs: Vec<ServerCatalog> = self
            .catalogs
            .iter()
            .filter(|catalog| catalog.server != *server)
            .cloned()
            .collect();

        let entry = ServerCatalog {
            server: server.clone(),
            configuration_index,
            tools: tools.into_iter().collect(),
        };
        let position = match self.policy {
            TieBreakPolicy::FirstConnected => catalogs.len(),
            TieBreakPolicy::ConfigurationOrder => catalogs
                .iter()
                .position(|catalog| catalog.configuration_index > configuration_index)
                .unwrap_or(catalogs.len()),
        };
        catalogs.insert(position, entry);

        Self::from_catalogs(self.policy, catalogs)
    }

    /// Returns a table without any entries for `server`.
    #[must_use]
    pub fn without_server(&self, server: &ServerName) -> Self {
        let catalogs = self
            .catalogs
            .iter()
            .filter(|catalog| catalog.server != *server)
            .cloned()
            .collect();
        Self::from_catalogs(self.policy, catalogs)
    }

    fn from_catalogs(policy: TieBreakPolicy, catalogs: Vec<ServerCatalog>) -> Self {
        let mut routes = HashMap::new();
        for catalog in &catalogs {
            for tool in &catalog.tools {
                routes
                    .entry(tool.clone())
                    .or_insert_with(|| catalog.server.clone());
            }
        }
        Self {
            policy,
            catalogs,
            routes,
        }
    }

    /// Returns the server a tool name routes to.
    #[must_use]
    pub fn resolve(&self, tool: &str) -> Option<&ServerName> {
        self.routes.get(tool)
    }

    /// Returns whether `server` has any catalog in the table.
    #[must_use]
    pub fn contains_server(&self, server: &ServerName) -> bool {
        self.catalogs.iter().any(|catalog| catalog.server == *server)
    }

    /// Returns routed tool names in sorted order.
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.routes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the tool names routed to `server`, in catalog order.
    #[must_use]
    pub fn tools_routed_to(&self, server: &ServerName) -> Vec<String> {
        self.catalogs
            .iter()
            .filter(|catalog| catalog.server == *server)
            .flat_map(|catalog| catalog.tools.iter())
            .filter(|tool| self.routes.get(*tool) == Some(server))
            .cloned()
            .collect()
    }

    /// Returns every tool name offered by more than one server.
    #[must_use]
    pub fn conflicts(&self) -> Vec<ToolConflict> {
        let mut conflicts: Vec<ToolConflict> = self
            .routes
            .iter()
            .filter_map(|(tool, winner)| {
                let shadowed: Vec<ServerName> = self
                    .catalogs
                    .iter()
                    .filter(|catalog| catalog.server != *winner && catalog.tools.contains(tool))
                    .map(|catalog| catalog.server.clone())
                    .collect();
                (!shadowed.is_empty()).then(|| ToolConflict {
                    tool: tool.clone(),
                    winner: winner.clone(),
                    shadowed,
                })
            })
            .collect();
        conflicts.sort_by(|left, right| left.tool.cmp(&right.tool));
        conflicts
    }

    /// Returns the number of routed tool names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns whether no tool is routed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
