//! One agent's aggregated tool surface across several servers.

use super::ServerConnection;
use crate::mcp_client::{
    domain::{
        AgentId, AgentStatus, ClientDomainError, ClientSettings, RoutingTable, ServerDescriptor,
        ServerName, ToolDefinition, ToolDescriptor,
    },
    error::{McpClientError, McpClientResult},
    ports::{SessionConnector, SessionError},
};
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use mockable::Clock;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, Semaphore};

/// Outcome of connecting or reconnecting a set of servers.
///
/// Entries appear in completion order.
#[derive(Debug, Clone, Default)]
pub struct ConnectReport {
    /// Servers that reached `Connected`.
    pub connected: Vec<ServerName>,
    /// Servers that ended `Failed`, with the reason.
    pub failed: Vec<(ServerName, McpClientError)>,
}

impl ConnectReport {
    /// Returns whether at least one server connected.
    #[must_use]
    pub fn any_connected(&self) -> bool {
        !self.connected.is_empty()
    }
}

/// Outcome of closing every connection. Failures are collected, never
/// raised.
#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    /// Connections closed cleanly.
    pub closed: usize,
    /// Close failures, for diagnostics.
    pub failures: Vec<McpClientError>,
}

impl TeardownReport {
    /// Returns whether every close succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct ServerSlot<C>
where
    C: Clock + Send + Sync,
{
    connection: ServerConnection<C>,
    configuration_index: usize,
    refresh: Mutex<()>,
}

impl<C> ServerSlot<C>
where
    C: Clock + Send + Sync,
{
    const fn name(&self) -> &ServerName {
        self.connection.name()
    }
}

/// Owns one agent's server connections and routes tool calls among them.
///
/// The routing table is replaced whole on every change, so readers see
/// either the old or the new mapping. A server's entries are removed before
/// its connection leaves `Connected` and added only after it reaches
/// `Connected` again.
///
/// `close_all` retires the client: handshakes still queued behind the
/// concurrency limit are abandoned and later connects are refused, so no
/// session outlives teardown.
pub struct MultiServerClient<C>
where
    C: Clock + Send + Sync,
{
    agent: AgentId,
    settings: ClientSettings,
    slots: Vec<ServerSlot<C>>,
    routes: RwLock<Arc<RoutingTable>>,
    closed: AtomicBool,
}

impl<C> MultiServerClient<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a client with one disconnected connection per descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`McpClientError::Domain`] when two descriptors share a
    /// server name.
    pub fn new(
        agent: AgentId,
        descriptors: Vec<ServerDescriptor>,
        connector: &Arc<dyn SessionConnector>,
        clock: &Arc<C>,
        settings: ClientSettings,
    ) -> McpClientResult<Self> {
        let mut seen = HashSet::new();
        let mut slots = Vec::with_capacity(descriptors.len());
        for (configuration_index, descriptor) in descriptors.into_iter().enumerate() {
            if !seen.insert(descriptor.name().clone()) {
                return Err(
                    ClientDomainError::DuplicateServerName(descriptor.name().to_string()).into(),
                );
            }
            let connection =
                ServerConnection::new(descriptor, Arc::clone(connector), Arc::clone(clock))
                    .with_call_timeout(settings.call_timeout());
            slots.push(ServerSlot {
                connection,
                configuration_index,
                refresh: Mutex::new(()),
            });
        }

        Ok(Self {
            agent,
            settings,
            slots,
            routes: RwLock::new(Arc::new(RoutingTable::new(settings.tie_break()))),
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the owning agent.
    #[must_use]
    pub const fn agent(&self) -> &AgentId {
        &self.agent
    }

    /// Returns the settings this client was built with.
    #[must_use]
    pub const fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Returns configured server names in configuration order.
    #[must_use]
    pub fn server_names(&self) -> Vec<ServerName> {
        self.slots.iter().map(|slot| slot.name().clone()).collect()
    }

    /// Returns whether `close_all` has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self, server: &ServerName) -> Option<&ServerConnection<C>> {
        self.slot(server).map(|slot| &slot.connection)
    }

    fn slot(&self, server: &ServerName) -> Option<&ServerSlot<C>> {
        self.slots.iter().find(|slot| slot.name() == server)
    }

    /// Connects every server with at most `max_concurrent` handshakes in
    /// flight, each bounded by `timeout` unless its descriptor overrides it.
    ///
    /// Failures never abort sibling attempts; they are recorded as `Failed`
    /// state and returned in the report. Each server's tools become routable
    /// as soon as its own handshake completes.
    pub async fn connect_all(&self, max_concurrent: usize, timeout: Duration) -> ConnectReport {
        tracing::info!(
            agent = %self.agent,
            servers = self.slots.len(),
            max_concurrent,
            "connecting agent MCP servers"
        );
        let report = self.refresh_all(max_concurrent, timeout).await;
        tracing::info!(
            agent = %self.agent,
            connected = report.connected.len(),
            failed = report.failed.len(),
            "agent MCP servers connected"
        );
        report
    }

    /// Re-runs the handshake for every server regardless of state.
    pub async fn reconnect_all(&self, max_concurrent: usize, timeout: Duration) -> ConnectReport {
        self.refresh_all(max_concurrent, timeout).await
    }

    /// Re-runs the handshake for one server using the configured connect
    /// timeout.
    ///
    /// On success the server's routing entries are replaced with its fresh
    /// catalog; on failure they stay removed.
    ///
    /// # Errors
    ///
    /// Returns [`McpClientError::UnknownServer`] when `server` is not
    /// configured, [`McpClientError::ConnectFailed`] once the client is
    /// closed, or the connection's handshake error.
    pub async fn reconnect(&self, server: &ServerName) -> McpClientResult<Vec<ToolDefinition>> {
        let slot = self
            .slot(server)
            .ok_or_else(|| McpClientError::UnknownServer(server.clone()))?;
        self.refresh(slot, self.settings.connect_timeout()).await
    }

    async fn refresh_all(&self, max_concurrent: usize, timeout: Duration) -> ConnectReport {
        let limiter = Semaphore::new(max_concurrent.max(1));
        let mut pending: FuturesUnordered<_> = self
            .slots
            .iter()
            .map(|slot| {
                let limiter_ref = &limiter;
                async move {
                    // The permit drops with this future, whatever the outcome.
                    let _permit = limiter_ref.acquire().await.ok();
                    (slot.name().clone(), self.refresh(slot, timeout).await)
                }
            })
            .collect();

        let mut report = ConnectReport::default();
        while let Some((server, outcome)) = pending.next().await {
            match outcome {
                Ok(_) => report.connected.push(server),
                Err(err) => report.failed.push((server, err)),
            }
        }
        report
    }

    async fn refresh(
        &self,
        slot: &ServerSlot<C>,
        timeout: Duration,
    ) -> McpClientResult<Vec<ToolDefinition>> {
        let _refresh = slot.refresh.lock().await;
        if self.is_closed() {
            return Err(McpClientError::ConnectFailed {
                server: slot.name().clone(),
                source: SessionError::Closed,
            });
        }
        self.replace_routes(|table| table.without_server(slot.name()))
            .await;

        let tools = slot.connection.connect(timeout).await?;
        let table = self
            .replace_routes(|table| {
                table.with_server(
                    slot.name(),
                    slot.configuration_index,
                    tools.iter().map(|tool| tool.name().to_owned()),
                )
            })
            .await;
        self.log_conflicts(&table, slot.name());
        Ok(tools)
    }

    async fn replace_routes(
        &self,
        update: impl FnOnce(&RoutingTable) -> RoutingTable,
    ) -> Arc<RoutingTable> {
        let mut routes = self.routes.write().await;
        let next = Arc::new(update(&routes));
        *routes = Arc::clone(&next);
        next
    }

    fn log_conflicts(&self, table: &RoutingTable, server: &ServerName) {
        for conflict in table.conflicts() {
            if conflict.winner != *server && !conflict.shadowed.contains(server) {
                continue;
            }
            let shadowed: Vec<&str> = conflict.shadowed.iter().map(ServerName::as_str).collect();
            tracing::warn!(
                agent = %self.agent,
                tool = %conflict.tool,
                winner = %conflict.winner,
                shadowed = ?shadowed,
                policy = %table.policy(),
                "duplicate tool name; routing to one server"
            );
        }
    }

    /// Routes a tool call to the server that owns `tool`.
    ///
    /// # Errors
    ///
    /// Returns [`McpClientError::UnknownTool`] when no connected server
    /// advertises `tool`, whatever the reason, or the connection's call
    /// error.
    pub async fn call_tool(&self, tool: &str, arguments: Value) -> McpClientResult<Value> {
        let server = self
            .server_for_tool(tool)
            .await
            .ok_or_else(|| McpClientError::UnknownTool {
                tool: tool.to_owned(),
            })?;
        let slot = self
            .slot(&server)
            .ok_or_else(|| McpClientError::UnknownServer(server.clone()))?;
        tracing::debug!(agent = %self.agent, server = %server, tool, "routing tool call");
        slot.connection.call_tool(tool, arguments).await
    }

    /// Returns the server `tool` currently routes to.
    pub async fn server_for_tool(&self, tool: &str) -> Option<ServerName> {
        self.routes.read().await.resolve(tool).cloned()
    }

    /// Returns a snapshot of the routing table.
    pub async fn routing_table(&self) -> Arc<RoutingTable> {
        Arc::clone(&*self.routes.read().await)
    }

    /// Returns every routable tool with its owning server, sorted by name.
    pub async fn available_tools(&self) -> Vec<ToolDescriptor> {
        let table = self.routing_table().await;
        let mut descriptors = Vec::new();
        for slot in &self.slots {
            let Ok(tools) = slot.connection.list_tools().await else {
                continue;
            };
            descriptors.extend(
                tools
                    .into_iter()
                    .filter(|tool| table.resolve(tool.name()) == Some(slot.name()))
                    .map(|tool| ToolDescriptor::new(slot.name().clone(), tool)),
            );
        }
        descriptors.sort_by(|left, right| left.name().cmp(right.name()));
        descriptors
    }

    /// Returns per-server state and the roll-up for this agent.
    pub async fn status(&self) -> AgentStatus {
        let mut servers = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            servers.push(slot.connection.status().await);
        }
        let routed_tools = self.routing_table().await.tool_names();
        AgentStatus::new(self.agent.clone(), servers, routed_tools)
    }

    /// Closes every connection concurrently and retires the client.
    ///
    /// Always completes; close failures are logged and collected. A
    /// handshake already under way finishes (bounded by its timeout) and its
    /// session is then closed.
    pub async fn close_all(&self) -> TeardownReport {
        self.closed.store(true, Ordering::Release);
        let outcomes = join_all(self.slots.iter().map(|slot| async move {
            let _refresh = slot.refresh.lock().await;
            self.replace_routes(|table| table.without_server(slot.name()))
                .await;
            slot.connection.close().await
        }))
        .await;

        let mut report = TeardownReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(()) => report.closed += 1,
                Err(err) => {
                    tracing::warn!(agent = %self.agent, error = %err, "MCP server close failed");
                    report.failures.push(err);
                }
            }
        }
        report
    }
}
