//! Child-process sessions: launch, handshake, catalog, calls, shutdown.

use super::protocol::{
    InitializeResult, ListToolsResult, SUPPORTED_PROTOCOL_VERSIONS, call_tool_params,
    initialize_params, list_tools_params, methods,
};
use super::transport::JsonRpcChannel;
use crate::mcp_client::{
    domain::{ServerDescriptor, ServerLocator, ServerName, ToolDefinition},
    ports::{McpSession, SessionConnector, SessionError, SessionResult},
};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::sync::Mutex;

/// Environment variable carrying the per-server configuration payload.
pub const SERVER_CONFIG_ENV: &str = "MCP_SERVER_CONFIG";

/// Time allowed for a server to exit after its input closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Upper bound on `tools/list` pages followed for one catalog.
const MAX_TOOL_PAGES: usize = 64;

type ChildChannel = JsonRpcChannel<ChildStdin>;

/// Opens MCP sessions by launching server processes and speaking
/// line-delimited JSON-RPC over their standard streams.
#[derive(Debug, Clone)]
pub struct StdioConnector {
    python_command: String,
    node_command: String,
    base_dir: Option<Utf8PathBuf>,
}

impl Default for StdioConnector {
    fn default() -> Self {
        Self {
            python_command: "python3".to_owned(),
            node_command: "node".to_owned(),
            base_dir: None,
        }
    }
}

impl StdioConnector {
    /// Creates a connector using `python3` and `node` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the interpreter used for Python modules.
    #[must_use]
    pub fn with_python_command(mut self, command: impl Into<String>) -> Self {
        self.python_command = command.into();
        self
    }

    /// Sets the runtime used for Node modules.
    #[must_use]
    pub fn with_node_command(mut self, command: impl Into<String>) -> Self {
        self.node_command = command.into();
        self
    }

    /// Resolves relative module paths and working directories against `dir`.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn resolve(&self, path: &str) -> Utf8PathBuf {
        let candidate = Utf8Path::new(path);
        match &self.base_dir {
            Some(base) if candidate.is_relative() => base.join(candidate),
            _ => candidate.to_path_buf(),
        }
    }

    async fn module_path(&self, module: &str) -> SessionResult<Utf8PathBuf> {
        let path = self.resolve(module);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(path),
            _ => Err(SessionError::Spawn(format!("server module not found: {path}"))),
        }
    }

    async fn launch_plan(&self, descriptor: &ServerDescriptor) -> SessionResult<LaunchPlan> {
        let mut plan = match descriptor.locator() {
            ServerLocator::Stdio(stdio) => LaunchPlan {
                program: stdio.command().to_owned(),
                args: stdio.args().to_vec(),
                env: stdio.env().clone(),
                working_directory: stdio.working_directory().map(|dir| self.resolve(dir)),
            },
            ServerLocator::Python { module } => LaunchPlan {
                program: self.python_command.clone(),
                args: vec!["-u".to_owned(), self.module_path(module).await?.into_string()],
                env: BTreeMap::new(),
                working_directory: self.base_dir.clone(),
            },
            ServerLocator::Node { module } => LaunchPlan {
                program: self.node_command.clone(),
                args: vec![self.module_path(module).await?.into_string()],
                env: BTreeMap::new(),
                working_directory: self.base_dir.clone(),
            },
        };

        plan.env.extend(
            descriptor
                .secrets()
                .iter()
                .map(|(key, value)| (key.to_owned(), value.to_owned())),
        );
        if let Some(config) = descriptor.config() {
            let encoded = serde_json::to_string(config).map_err(|err| {
                SessionError::Spawn(format!("failed to encode server config: {err}"))
            })?;
            plan.env.insert(SERVER_CONFIG_ENV.to_owned(), encoded);
        }
        Ok(plan)
    }
}

struct LaunchPlan {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_directory: Option<Utf8PathBuf>,
}

#[async_trait]
impl SessionConnector for StdioConnector {
    async fn open(&self, descriptor: &ServerDescriptor) -> SessionResult<Arc<dyn McpSession>> {
        let server = descriptor.name().clone();
        let plan = self.launch_plan(descriptor).await?;

        let mut command = Command::new(&plan.program);
        command
            .args(&plan.args)
            .envs(&plan.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &plan.working_directory {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|err| SessionError::Spawn(format!("{}: {err}", plan.program)))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::Spawn("failed to capture server stdin".to_owned()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::Spawn("failed to capture server stdout".to_owned()))?;
        if let Some(stderr) = child.stderr.take() {
            forward_stderr(server.clone(), stderr);
        }

        tracing::debug!(server = %server, program = %plan.program, "launched MCP server process");
        let session = StdioSession {
            channel: JsonRpcChannel::new(server.as_str(), BufReader::new(stdout), stdin),
            server,
            child: Mutex::new(Some(child)),
            closed: AtomicBool::new(false),
        };
        session.initialize().await?;
        Ok(Arc::new(session))
    }
}

fn forward_stderr(server: ServerName, stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(server = %server, stderr = %line, "MCP server stderr");
        }
    });
}

/// Session backed by a child process.
///
/// Dropping the session kills the process.
struct StdioSession {
    server: ServerName,
    channel: ChildChannel,
    child: Mutex<Option<Child>>,
    closed: AtomicBool,
}

impl StdioSession {
    async fn initialize(&self) -> SessionResult<()> {
        let result = self
            .channel
            .request(methods::INITIALIZE, Some(initialize_params()))
            .await?;
        let initialized: InitializeResult = serde_json::from_value(result).map_err(|err| {
            SessionError::ProtocolMismatch(format!("invalid initialize result: {err}"))
        })?;
        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&initialized.protocol_version.as_str()) {
            return Err(SessionError::ProtocolMismatch(format!(
                "unsupported protocol version {}",
                initialized.protocol_version
            )));
        }

        let (server_name, server_version) = initialized
            .server_info
            .map(|info| (info.name, info.version))
            .unwrap_or_default();
        tracing::debug!(
            server = %self.server,
            protocol = %initialized.protocol_version,
            reported_name = server_name.as_deref().unwrap_or_default(),
            reported_version = server_version.as_deref().unwrap_or_default(),
            "MCP handshake complete"
        );
        self.channel.notify(methods::INITIALIZED, None).await
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl McpSession for StdioSession {
    async fn list_tools(&self) -> SessionResult<Vec<ToolDefinition>> {
        self.ensure_open()?;
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let result = self
                .channel
                .request(methods::TOOLS_LIST, list_tools_params(cursor.as_deref()))
                .await?;
            let page: ListToolsResult = serde_json::from_value(result).map_err(|err| {
                SessionError::ProtocolMismatch(format!("invalid tools/list result: {err}"))
            })?;
            for tool in page.tools {
                tools.push(ToolDefinition::try_from(tool)?);
            }
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }
        Err(SessionError::ProtocolMismatch(format!(
            "tools/list pagination exceeded {MAX_TOOL_PAGES} pages"
        )))
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> SessionResult<Value> {
        self.ensure_open()?;
        self.channel
            .request(methods::TOOLS_CALL, Some(call_tool_params(name, arguments)))
            .await
    }

    async fn close(&self) -> SessionResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.channel.cancel_pending(&SessionError::Closed);
        match tokio::time::timeout(SHUTDOWN_GRACE, self.channel.shutdown_input()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::debug!(server = %self.server, error = %err, "closing server input failed");
            }
            Err(_) => tracing::debug!(server = %self.server, "closing server input timed out"),
        }

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(server = %self.server, %status, "MCP server exited");
                Ok(())
            }
            Ok(Err(err)) => Err(SessionError::Transport(format!(
                "failed to wait for server exit: {err}"
            ))),
            Err(_) => {
                tracing::warn!(server = %self.server, "MCP server ignored shutdown; killing");
                child
                    .kill()
                    .await
                    .map_err(|err| SessionError::Transport(format!("failed to kill server: {err}")))
            }
        }
    }
}
