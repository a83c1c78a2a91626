//! One server connection: lifecycle state, session, and catalog.

use crate::mcp_client::{
    domain::{
        ConnectionState, ServerDescriptor, ServerName, ServerStatus, SessionId, ToolDefinition,
    },
    error::{McpClientError, McpClientResult},
    ports::{McpSession, SessionConnector, SessionError, SessionResult},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

/// Live connection to one configured server.
///
/// State changes only happen inside `connect` and `close`, which are
/// serialized per connection. Readers never wait on a handshake.
pub struct ServerConnection<C>
where
    C: Clock + Send + Sync,
{
    descriptor: ServerDescriptor,
    connector: Arc<dyn SessionConnector>,
    clock: Arc<C>,
    call_timeout: Option<Duration>,
    inner: RwLock<ConnectionInner>,
    lifecycle: Mutex<()>,
}

struct ConnectionInner {
    state: ConnectionState,
    session: Option<Arc<dyn McpSession>>,
    tools: Vec<ToolDefinition>,
    last_error: Option<String>,
    session_id: Option<SessionId>,
    changed_at: DateTime<Utc>,
}

impl<C> ServerConnection<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a disconnected connection.
    #[must_use]
    pub fn new(
        descriptor: ServerDescriptor,
        connector: Arc<dyn SessionConnector>,
        clock: Arc<C>,
    ) -> Self {
        let changed_at = clock.utc();
        Self {
            descriptor,
            connector,
            clock,
            call_timeout: None,
            inner: RwLock::new(ConnectionInner {
                state: ConnectionState::Disconnected,
                session: None,
                tools: Vec::new(),
                last_error: None,
                session_id: None,
                changed_at,
            }),
            lifecycle: Mutex::new(()),
        }
    }

    /// Applies a deadline to every tool call.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Returns the server name.
    #[must_use]
    pub const fn name(&self) -> &ServerName {
        self.descriptor.name()
    }

    /// Returns the descriptor this connection was built from.
    #[must_use]
    pub const fn descriptor(&self) -> &ServerDescriptor {
        &self.descriptor
    }

    /// Returns the current state.
    pub async fn state(&self) -> ConnectionState {
        self.inner.read().await.state
    }

    /// Opens a session, performs the handshake, and discovers the catalog.
    ///
    /// Any existing session is released first. The descriptor's own timeout
    /// takes precedence over `default_timeout`. Success leaves the
    /// connection `Connected`; any failure leaves it `Failed` with the error
    /// recorded.
    ///
    /// # Errors
    ///
    /// Returns [`McpClientError::ConnectTimeout`] when the handshake does not
    /// finish in time and [`McpClientError::ConnectFailed`] for any other
    /// handshake failure.
    pub async fn connect(&self, default_timeout: Duration) -> McpClientResult<Vec<ToolDefinition>> {
        let _lifecycle = self.lifecycle.lock().await;
        if let Some(previous) = self.begin_connect().await? {
            self.release(previous.as_ref()).await;
        }

        let timeout = self.descriptor.connect_timeout().unwrap_or(default_timeout);
        let started = Instant::now();
        tracing::info!(server = %self.name(), timeout_ms = duration_ms(timeout), "connecting to MCP server");

        match tokio::time::timeout(timeout, self.handshake()).await {
            Ok(Ok((session, tools))) => {
                tracing::info!(
                    server = %self.name(),
                    tools = tools.len(),
                    elapsed_ms = duration_ms(started.elapsed()),
                    "MCP server connected"
                );
                self.finish_connected(session, tools.clone()).await?;
                Ok(tools)
            }
            Ok(Err(source)) => {
                tracing::warn!(server = %self.name(), error = %source, "MCP server handshake failed");
                self.finish_failed(source.to_string()).await?;
                Err(McpClientError::ConnectFailed {
                    server: self.name().clone(),
                    source,
                })
            }
            Err(_) => {
                tracing::warn!(
                    server = %self.name(),
                    timeout_ms = duration_ms(timeout),
                    "MCP server handshake timed out"
                );
                self.finish_failed(format!("handshake timed out after {timeout:?}"))
                    .await?;
                Err(McpClientError::ConnectTimeout {
                    server: self.name().clone(),
                    timeout,
                })
            }
        }
    }

    async fn begin_connect(&self) -> McpClientResult<Option<Arc<dyn McpSession>>> {
        let mut inner = self.inner.write().await;
        // A cancelled attempt can leave `Connecting` behind.
        if inner.state != ConnectionState::Connecting {
            inner.state = inner.state.transition_to(ConnectionState::Connecting)?;
        }
        inner.tools.clear();
        inner.session_id = None;
        inner.changed_at = self.clock.utc();
        Ok(inner.session.take())
    }

    async fn handshake(&self) -> SessionResult<(Arc<dyn McpSession>, Vec<ToolDefinition>)> {
        let session = self.connector.open(&self.descriptor).await?;
        match session.list_tools().await {
            Ok(tools) => Ok((session, tools)),
            Err(err) => {
                self.release(session.as_ref()).await;
                Err(err)
            }
        }
    }

    async fn finish_connected(
        &self,
        session: Arc<dyn McpSession>,
        tools: Vec<ToolDefinition>,
    ) -> McpClientResult<()> {
        let mut inner = self.inner.write().await;
        inner.state = inner.state.transition_to(ConnectionState::Connected)?;
        inner.session = Some(session);
        inner.tools = tools;
        inner.last_error = None;
        inner.session_id = Some(SessionId::new());
        inner.changed_at = self.clock.utc();
        Ok(())
    }

    async fn finish_failed(&self, message: String) -> McpClientResult<()> {
        let mut inner = self.inner.write().await;
        inner.state = inner.state.transition_to(ConnectionState::Failed)?;
        inner.last_error = Some(message);
        inner.changed_at = self.clock.utc();
        Ok(())
    }

    async fn release(&self, session: &dyn McpSession) {
        if let Err(err) = session.close().await {
            tracing::debug!(server = %self.name(), error = %err, "releasing stale MCP session failed");
        }
    }

    /// Returns the catalog discovered by the last successful handshake.
    ///
    /// # Errors
    ///
    /// Returns [`McpClientError::NotConnected`] unless the connection is
    /// `Connected`.
    pub async fn list_tools(&self) -> McpClientResult<Vec<ToolDefinition>> {
        let inner = self.inner.read().await;
        if !inner.state.is_usable() {
            return Err(McpClientError::NotConnected {
                server: self.name().clone(),
                state: inner.state,
            });
        }
        Ok(inner.tools.clone())
    }

    /// Forwards a tool call and returns the server's result verbatim.
    ///
    /// Tools missing from the local catalog are rejected without contacting
    /// the server.
    ///
    /// # Errors
    ///
    /// Returns [`McpClientError::NotConnected`],
    /// [`McpClientError::UnknownTool`], or [`McpClientError::CallFailed`].
    pub async fn call_tool(&self, tool: &str, arguments: Value) -> McpClientResult<Value> {
        let session = {
            let inner = self.inner.read().await;
            let live = match (&inner.session, inner.state.is_usable()) {
                (Some(current), true) => Arc::clone(current),
                _ => {
                    return Err(McpClientError::NotConnected {
                        server: self.name().clone(),
                        state: inner.state,
                    });
                }
            };
            if !inner.tools.iter().any(|definition| definition.name() == tool) {
                return Err(McpClientError::UnknownTool {
                    tool: tool.to_owned(),
                });
            }
            live
        };

        let call = session.call_tool(tool, arguments);
        let result = match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| Err(SessionError::DeadlineElapsed)),
            None => call.await,
        };
        result.map_err(|source| McpClientError::CallFailed {
            server: self.name().clone(),
            tool: tool.to_owned(),
            source,
        })
    }

    /// Releases the session and moves to `Disconnected`.
    ///
    /// Safe in every state, including before any connect attempt. The
    /// connection is `Disconnected` afterwards even when releasing fails.
    ///
    /// # Errors
    ///
    /// Returns [`McpClientError::CloseFailed`] when the session reports an
    /// error while closing.
    pub async fn close(&self) -> McpClientResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let session = {
            let mut inner = self.inner.write().await;
            inner.state = inner.state.transition_to(ConnectionState::Disconnected)?;
            inner.tools.clear();
            inner.session_id = None;
            inner.changed_at = self.clock.utc();
            inner.session.take()
        };

        let Some(live) = session else {
            return Ok(());
        };
        live.close()
            .await
            .map_err(|source| McpClientError::CloseFailed {
                server: self.name().clone(),
                source,
            })
    }

    /// Returns a status snapshot.
    pub async fn status(&self) -> ServerStatus {
        let inner = self.inner.read().await;
        ServerStatus::new(self.name().clone(), inner.state, inner.changed_at)
            .with_last_error(inner.last_error.clone())
            .with_tool_count(inner.tools.len())
            .with_session_id(inner.session_id)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
