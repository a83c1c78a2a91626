//! Connects one agent from configuration files and reports what it sees.
//!
//! Usage:
//!
//! ```text
//! switchyard-probe <base-dir> <commands.json> [secrets.json] [--call <tool> <json-arguments>]
//! ```
//!
//! Paths after `base-dir` are relative to it. `commands.json` holds an
//! `mcp_commands` list; the optional secrets file maps server names or
//! launch targets to environment variables. A representative commands file:
//!
//! ```json
//! {
//!   "mcp_commands": [
//!     { "python_code_module": "tools/fileio.py" },
//!     { "node_code_module": "tools/calendar.js", "connect_timeout_ms": 5000 },
//!     { "command": "npx", "args": ["-y", "timely-mcp"], "server_name": "timely" }
//!   ]
//! }
//! ```
//!
//! The agent status, the routed tools, and the optional call result are
//! written to standard output as one JSON document. Servers then shut down.

use camino::Utf8PathBuf;
use mockable::DefaultClock;
use serde_json::{Value, json};
use std::io::Write;
use std::sync::Arc;
use switchyard::mcp_client::{
    adapters::{ConfigFileError, ConfigFileLoader, ConnectorRegistry, StdioConnector},
    domain::{AgentId, ClientDomainError, ClientSettings},
    services::ClientRegistry,
};
use switchyard::telemetry::init_tracing;
use thiserror::Error;
use tokio::runtime::Builder;

const PROBE_AGENT: &str = "probe";

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while probing.
#[derive(Debug, Error)]
enum ProbeError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error(transparent)]
    Config(#[from] ConfigFileError),
    #[error(transparent)]
    Domain(#[from] ClientDomainError),
    #[error("runtime init failed: {0}")]
    RuntimeInit(#[source] std::io::Error),
    #[error("failed to write report: {0}")]
    Output(#[source] std::io::Error),
}

#[derive(Debug)]
struct ProbeArgs {
    base_dir: Utf8PathBuf,
    commands: Utf8PathBuf,
    secrets: Option<Utf8PathBuf>,
    call: Option<(String, Value)>,
}

fn main() -> Result<(), BoxError> {
    let _installed = init_tracing("info");
    let args = parse_args(collect_args()?)?;
    run_probe(&args).map_err(Into::into)
}

fn collect_args() -> Result<Vec<String>, ProbeError> {
    std::env::args_os()
        .skip(1)
        .map(|arg_os| {
            arg_os
                .into_string()
                .map_err(|_| ProbeError::InvalidArgs("argument is not valid UTF-8".to_owned()))
        })
        .collect()
}

fn parse_args(args: Vec<String>) -> Result<ProbeArgs, ProbeError> {
    let (positional, call_args) = match args.iter().position(|arg| arg == "--call") {
        Some(index) => {
            let (head, tail) = args.split_at(index);
            (head.to_vec(), Some(tail.iter().skip(1).cloned().collect::<Vec<_>>()))
        }
        None => (args, None),
    };

    let mut positional_iter = positional.into_iter();
    let base_dir = positional_iter
        .next()
        .map(Utf8PathBuf::from)
        .ok_or_else(|| ProbeError::InvalidArgs("missing <base-dir>".to_owned()))?;
    let commands = positional_iter
        .next()
        .map(Utf8PathBuf::from)
        .ok_or_else(|| ProbeError::InvalidArgs("missing <commands.json>".to_owned()))?;
    let secrets = positional_iter.next().map(Utf8PathBuf::from);
    if let Some(extra) = positional_iter.next() {
        return Err(ProbeError::InvalidArgs(format!("unexpected argument '{extra}'")));
    }

    let call = call_args.map(parse_call).transpose()?;
    Ok(ProbeArgs {
        base_dir,
        commands,
        secrets,
        call,
    })
}

fn parse_call(values: Vec<String>) -> Result<(String, Value), ProbeError> {
    let mut values_iter = values.into_iter();
    let tool = values_iter
        .next()
        .ok_or_else(|| ProbeError::InvalidArgs("--call needs a tool name".to_owned()))?;
    let arguments = match values_iter.next() {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|err| ProbeError::InvalidArgs(format!("invalid JSON arguments: {err}")))?,
        None => json!({}),
    };
    Ok((tool, arguments))
}

fn run_probe(args: &ProbeArgs) -> Result<(), ProbeError> {
    let loader = ConfigFileLoader::open(args.base_dir.clone())?;
    let commands = loader.load_commands(&args.commands)?;
    let secrets = args
        .secrets
        .as_deref()
        .map(|path| loader.load_secrets(path))
        .transpose()?
        .unwrap_or_default();
    let agent = AgentId::new(PROBE_AGENT)?;

    let connector = ConnectorRegistry::with_stdio(
        StdioConnector::new().with_base_dir(args.base_dir.clone()),
    );
    let registry = ClientRegistry::new(
        Arc::new(connector),
        Arc::new(DefaultClock),
        ClientSettings::default(),
    );

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ProbeError::RuntimeInit)?;
    let report = runtime.block_on(async {
        let outcome = registry
            .add_agent_from_config(agent.clone(), &commands, &secrets)
            .await;
        let mut document = json!({ "agent": agent.as_str() });
        match outcome {
            Ok(usable) => {
                document["usable"] = json!(usable);
            }
            Err(err) => {
                document["error"] = json!(err.to_string());
            }
        }

        if let Some(client) = registry.client(&agent).await {
            document["status"] = json!(client.status().await);
            document["tools"] = json!(
                client
                    .available_tools()
                    .await
                    .iter()
                    .map(|tool| json!({
                        "name": tool.name(),
                        "server": tool.server().as_str(),
                        "description": tool.description(),
                    }))
                    .collect::<Vec<_>>()
            );
        }

        if let Some((tool, arguments)) = &args.call {
            document["call"] = match registry.call_tool(&agent, tool, arguments.clone()).await {
                Ok(result) => json!({ "tool": tool, "result": result }),
                Err(err) => json!({ "tool": tool, "error": err.to_string() }),
            };
        }

        let shutdown = registry.shutdown().await;
        document["clean_shutdown"] = json!(shutdown.is_clean());
        document
    });

    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| ProbeError::Output(std::io::Error::other(err)))?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}").map_err(ProbeError::Output)
}
