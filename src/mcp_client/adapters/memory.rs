//! In-memory session connector for deterministic tests and local flows.

use crate::mcp_client::{
    domain::{ServerDescriptor, ServerName, ToolDefinition},
    ports::{McpSession, SessionConnector, SessionError, SessionResult},
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::Duration;

/// JSON-RPC internal error code reported for scripted failures.
const SCRIPTED_ERROR_CODE: i64 = -32603;

/// How a scripted server answers the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HandshakeBehaviour {
    /// Complete the handshake after the configured delay.
    #[default]
    Accept,
    /// Fail the handshake with a protocol error.
    Refuse(String),
    /// Never answer.
    Hang,
}

/// Scripted behaviour for one named server.
#[derive(Debug, Clone, Default)]
pub struct ScriptedServer {
    tools: Vec<ToolDefinition>,
    handshake: HandshakeBehaviour,
    handshake_delay: Duration,
    call_delay: Duration,
    failing_tools: HashMap<String, String>,
    close_error: Option<String>,
}

impl ScriptedServer {
    /// Creates a server that accepts immediately and advertises no tools.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the advertised catalog.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Delays the handshake by `delay`.
    #[must_use]
    pub const fn with_handshake_delay(mut self, delay: Duration) -> Self {
        self.handshake_delay = delay;
        self
    }

    /// Delays every tool call by `delay`.
    #[must_use]
    pub const fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Makes the handshake fail with `message`.
    #[must_use]
    pub fn refusing(mut self, message: impl Into<String>) -> Self {
        self.handshake = HandshakeBehaviour::Refuse(message.into());
        self
    }

    /// Makes the handshake never complete.
    #[must_use]
    pub fn hanging(mut self) -> Self {
        self.handshake = HandshakeBehaviour::Hang;
        self
    }

    /// Makes calls to `tool` fail with `message`.
    #[must_use]
    pub fn with_failing_tool(mut self, tool: impl Into<String>, message: impl Into<String>) -> Self {
        self.failing_tools.insert(tool.into(), message.into());
        self
    }

    /// Makes `close` report `message` after releasing the session.
    #[must_use]
    pub fn with_close_error(mut self, message: impl Into<String>) -> Self {
        self.close_error = Some(message.into());
        self
    }
}

/// A tool call observed by the in-memory connector.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Server that received the call.
    pub server: ServerName,
    /// Tool name.
    pub tool: String,
    /// Arguments passed through.
    pub arguments: Value,
}

#[derive(Debug, Default)]
struct InMemoryConnectorState {
    servers: HashMap<ServerName, ScriptedServer>,
    handshakes_in_flight: usize,
    peak_handshakes: usize,
    opened: HashMap<ServerName, usize>,
    closed: HashMap<ServerName, usize>,
    calls: Vec<RecordedCall>,
}

/// In-memory session connector.
///
/// Servers are scripted by name; opening a descriptor whose name has no
/// script fails as a launch error. The connector records handshake
/// concurrency, session counts, and tool calls for assertions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnector {
    state: Arc<RwLock<InMemoryConnectorState>>,
}

impl InMemoryConnector {
    /// Creates a connector with no scripted servers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the server reachable under `name`, replacing any previous
    /// script. Sessions already open keep their catalog.
    ///
    /// # Errors
    ///
    /// Returns runtime errors when lock acquisition fails.
    pub fn script(&self, name: ServerName, server: ScriptedServer) -> SessionResult<()> {
        self.write_state()?.servers.insert(name, server);
        Ok(())
    }

    /// Returns the highest number of handshakes observed in flight at once.
    ///
    /// # Errors
    ///
    /// Returns runtime errors when lock acquisition fails.
    pub fn peak_handshakes(&self) -> SessionResult<usize> {
        self.read_state(|state| state.peak_handshakes)
    }

    /// Returns how many sessions were opened for `name`.
    ///
    /// # Errors
    ///
    /// Returns runtime errors when lock acquisition fails.
    pub fn open_count(&self, name: &ServerName) -> SessionResult<usize> {
        self.read_state(|state| state.opened.get(name).copied().unwrap_or_default())
    }

    /// Returns how many sessions were closed for `name`.
    ///
    /// # Errors
    ///
    /// Returns runtime errors when lock acquisition fails.
    pub fn close_count(&self, name: &ServerName) -> SessionResult<usize> {
        self.read_state(|state| state.closed.get(name).copied().unwrap_or_default())
    }

    /// Returns every recorded tool call in arrival order.
    ///
    /// # Errors
    ///
    /// Returns runtime errors when lock acquisition fails.
    pub fn calls(&self) -> SessionResult<Vec<RecordedCall>> {
        self.read_state(|state| state.calls.clone())
    }

    fn read_state<T>(&self, read: impl FnOnce(&InMemoryConnectorState) -> T) -> SessionResult<T> {
        let state = self
            .state
            .read()
            .map_err(|err| SessionError::runtime(std::io::Error::other(err.to_string())))?;
        Ok(read(&state))
    }

    fn write_state(&self) -> SessionResult<RwLockWriteGuard<'_, InMemoryConnectorState>> {
        self.state
            .write()
            .map_err(|err| SessionError::runtime(std::io::Error::other(err.to_string())))
    }
}

/// Counts one in-flight handshake until dropped, including on cancellation.
struct HandshakeGuard {
    state: Arc<RwLock<InMemoryConnectorState>>,
}

impl HandshakeGuard {
    fn enter(connector: &InMemoryConnector) -> SessionResult<Self> {
        let mut state = connector.write_state()?;
        state.handshakes_in_flight += 1;
        state.peak_handshakes = state.peak_handshakes.max(state.handshakes_in_flight);
        Ok(Self {
            state: Arc::clone(&connector.state),
        })
    }
}

impl Drop for HandshakeGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.write() {
            state.handshakes_in_flight = state.handshakes_in_flight.saturating_sub(1);
        }
    }
}

#[async_trait]
impl SessionConnector for InMemoryConnector {
    async fn open(&self, descriptor: &ServerDescriptor) -> SessionResult<Arc<dyn McpSession>> {
        let _guard = HandshakeGuard::enter(self)?;
        let name = descriptor.name().clone();
        let script = self
            .read_state(|state| state.servers.get(&name).cloned())?
            .ok_or_else(|| SessionError::Spawn(format!("no scripted server named {name}")))?;

        if !script.handshake_delay.is_zero() {
            tokio::time::sleep(script.handshake_delay).await;
        }
        match &script.handshake {
            HandshakeBehaviour::Accept => {}
            HandshakeBehaviour::Refuse(message) => {
                return Err(SessionError::Protocol {
                    code: SCRIPTED_ERROR_CODE,
                    message: message.clone(),
                });
            }
            HandshakeBehaviour::Hang => std::future::pending::<()>().await,
        }

        *self.write_state()?.opened.entry(name.clone()).or_default() += 1;
        Ok(Arc::new(InMemorySession {
            server: name,
            script,
            connector: self.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Session returned by [`InMemoryConnector`].
struct InMemorySession {
    server: ServerName,
    script: ScriptedServer,
    connector: InMemoryConnector,
    closed: AtomicBool,
}

impl InMemorySession {
    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl McpSession for InMemorySession {
    async fn list_tools(&self) -> SessionResult<Vec<ToolDefinition>> {
        self.ensure_open()?;
        Ok(self.script.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> SessionResult<Value> {
        self.ensure_open()?;
        if !self.script.call_delay.is_zero() {
            tokio::time::sleep(self.script.call_delay).await;
        }
        self.connector.write_state()?.calls.push(RecordedCall {
            server: self.server.clone(),
            tool: name.to_owned(),
            arguments: arguments.clone(),
        });

        if let Some(message) = self.script.failing_tools.get(name) {
            return Err(SessionError::Protocol {
                code: SCRIPTED_ERROR_CODE,
                message: message.clone(),
            });
        }
        Ok(json!({
            "server": self.server.as_str(),
            "tool": name,
            "arguments": arguments,
        }))
    }

    async fn close(&self) -> SessionResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        *self
            .connector
            .write_state()?
            .closed
            .entry(self.server.clone())
            .or_default() += 1;
        self.script
            .close_error
            .as_ref()
            .map_or(Ok(()), |message| Err(SessionError::Transport(message.clone())))
    }
}
