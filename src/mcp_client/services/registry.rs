//! Registry of agent clients; the single entry point for the platform.

use super::{ConnectReport, MultiServerClient, TeardownReport};
use crate::mcp_client::{
    domain::{
        AgentId, AgentStatus, ClientSettings, CommandSecrets, McpCommandsConfig, ServerDescriptor,
    },
    error::{McpClientError, McpClientResult},
    ports::SessionConnector,
};
use futures::future::join_all;
use mockable::Clock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Outcome of shutting the registry down.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Agents whose connections were all closed cleanly.
    pub clean_agents: usize,
    /// Close failures across every agent.
    pub failures: Vec<McpClientError>,
    /// Agents whose teardown exceeded the per-agent bound.
    pub timed_out: Vec<AgentId>,
}

impl ShutdownReport {
    /// Returns whether every agent closed cleanly in time.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.timed_out.is_empty()
    }
}

/// Maps agent identifiers to their clients.
///
/// Each agent's client is exclusively owned here; callers reach servers
/// only through the registry operations.
pub struct ClientRegistry<C>
where
    C: Clock + Send + Sync,
{
    agents: RwLock<HashMap<AgentId, Arc<MultiServerClient<C>>>>,
    connector: Arc<dyn SessionConnector>,
    clock: Arc<C>,
    settings: ClientSettings,
}

impl<C> ClientRegistry<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new(connector: Arc<dyn SessionConnector>, clock: Arc<C>, settings: ClientSettings) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            connector,
            clock,
            settings,
        }
    }

    /// Returns the settings applied to every agent.
    #[must_use]
    pub const fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Registers `agent` and connects its servers.
    ///
    /// The agent is visible (with servers `Connecting`) while the handshakes
    /// run. Returns whether at least one server connected; partial success
    /// is reported through status, not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`McpClientError::AlreadyExists`] when `agent` is registered,
    /// [`McpClientError::Domain`] for duplicate server names, or
    /// [`McpClientError::NotFound`] when the agent is removed before its
    /// handshakes finish.
    pub async fn add_agent(
        &self,
        agent: AgentId,
        descriptors: Vec<ServerDescriptor>,
        max_concurrent: usize,
        timeout: Duration,
    ) -> McpClientResult<bool> {
        let client = Arc::new(MultiServerClient::new(
            agent.clone(),
            descriptors,
            &self.connector,
            &self.clock,
            self.settings,
        )?);
        {
            let mut agents = self.agents.write().await;
            if agents.contains_key(&agent) {
                return Err(McpClientError::AlreadyExists(agent));
            }
            agents.insert(agent.clone(), Arc::clone(&client));
        }

        let report = client.connect_all(max_concurrent, timeout).await;
        if client.is_closed() {
            tracing::info!(agent = %agent, "agent removed while its servers were connecting");
            return Err(McpClientError::NotFound(agent));
        }
        if !report.any_connected() {
            tracing::warn!(agent = %agent, "no MCP server connected for agent");
        }
        Ok(report.any_connected())
    }

    /// Registers `agent` from its tool-command configuration using the
    /// registry settings.
    ///
    /// # Errors
    ///
    /// Returns configuration errors as [`McpClientError::Domain`], or the
    /// errors of [`Self::add_agent`].
    pub async fn add_agent_from_config(
        &self,
        agent: AgentId,
        commands: &McpCommandsConfig,
        secrets: &CommandSecrets,
    ) -> McpClientResult<bool> {
        let descriptors = commands.to_descriptors(secrets)?;
        self.add_agent(
            agent,
            descriptors,
            self.settings.max_concurrent_connections(),
            self.settings.connect_timeout(),
        )
        .await
    }

    /// Unregisters `agent` and closes its connections.
    ///
    /// # Errors
    ///
    /// Returns [`McpClientError::NotFound`] when `agent` is not registered.
    pub async fn remove_agent(&self, agent: &AgentId) -> McpClientResult<TeardownReport> {
        let client = self
            .agents
            .write()
            .await
            .remove(agent)
            .ok_or_else(|| McpClientError::NotFound(agent.clone()))?;
        tracing::info!(agent = %agent, "removing agent");
        Ok(client.close_all().await)
    }

    /// Routes a tool call through `agent`'s client.
    ///
    /// # Errors
    ///
    /// Returns [`McpClientError::NotFound`] for an unknown agent, or the
    /// client's call errors.
    pub async fn call_tool(
        &self,
        agent: &AgentId,
        tool: &str,
        arguments: Value,
    ) -> McpClientResult<Value> {
        self.require(agent).await?.call_tool(tool, arguments).await
    }

    /// Re-runs every handshake for `agent` using the registry settings.
    ///
    /// # Errors
    ///
    /// Returns [`McpClientError::NotFound`] for an unknown agent.
    pub async fn reconnect_agent(&self, agent: &AgentId) -> McpClientResult<ConnectReport> {
        let client = self.require(agent).await?;
        Ok(client
            .reconnect_all(
                self.settings.max_concurrent_connections(),
                self.settings.connect_timeout(),
            )
            .await)
    }

    /// Returns the status of every registered agent.
    pub async fn status_summary(&self) -> BTreeMap<AgentId, AgentStatus> {
        let clients = self.snapshot().await;
        let mut summary = BTreeMap::new();
        for (agent, client) in clients {
            summary.insert(agent, client.status().await);
        }
        summary
    }

    /// Returns registered agent identifiers in sorted order.
    pub async fn agent_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns whether `agent` is registered.
    pub async fn has_agent(&self, agent: &AgentId) -> bool {
        self.agents.read().await.contains_key(agent)
    }

    /// Returns `agent`'s client.
    pub async fn client(&self, agent: &AgentId) -> Option<Arc<MultiServerClient<C>>> {
        self.agents.read().await.get(agent).cloned()
    }

    /// Closes every agent concurrently and empties the registry.
    ///
    /// Each agent's teardown is bounded by the configured teardown timeout;
    /// failures and timeouts are collected, never raised.
    pub async fn shutdown(&self) -> ShutdownReport {
        let drained: Vec<(AgentId, Arc<MultiServerClient<C>>)> =
            self.agents.write().await.drain().collect();
        let bound = self.settings.teardown_timeout();
        tracing::info!(agents = drained.len(), "shutting down MCP client registry");

        let outcomes = join_all(drained.into_iter().map(|(agent, client)| async move {
            let outcome = tokio::time::timeout(bound, client.close_all()).await;
            (agent, outcome)
        }))
        .await;

        let mut report = ShutdownReport::default();
        for (agent, outcome) in outcomes {
            match outcome {
                Ok(teardown) if teardown.is_clean() => report.clean_agents += 1,
                Ok(teardown) => report.failures.extend(teardown.failures),
                Err(_) => {
                    tracing::warn!(agent = %agent, bound = ?bound, "agent teardown timed out");
                    report.timed_out.push(agent);
                }
            }
        }
        report
    }

    async fn require(&self, agent: &AgentId) -> McpClientResult<Arc<MultiServerClient<C>>> {
        self.client(agent)
            .await
            .ok_or_else(|| McpClientError::NotFound(agent.clone()))
    }

    async fn snapshot(&self) -> Vec<(AgentId, Arc<MultiServerClient<C>>)> {
        self.agents
            .read()
            .await
            .iter()
            .map(|(agent, client)| (agent.clone(), Arc::clone(client)))
            .collect()
    }
}
