//! End-to-end tests against real child processes speaking MCP over STDIO.
#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use serde_json::json;
use switchyard::mcp_client::{
    McpClientError,
    adapters::{ConnectorRegistry, StdioConnector},
    domain::{
        AgentId, ClientSettings, ConnectionState, SecretEnv, ServerDescriptor, ServerLocator,
        ServerName, StdioLocator,
    },
    ports::{SessionConnector, SessionError},
    services::{ClientRegistry, ServerConnection},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const SCRIPTED_SERVER: &str = r#"
read -r _initialize
echo 'booting scripted server'
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2025-03-26","capabilities":{"tools":{}},"serverInfo":{"name":"scripted","version":"0.1.0"}}}'
read -r _initialized
read -r _list
printf '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo","description":"token %s","inputSchema":{"type":"object"}}]}}\n' "$SCRIPTED_TOKEN"
read -r _call
printf '%s\n' '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"echoed"}],"isError":false}}'
read -r _eof
"#;

const PARALLEL_SERVER: &str = r#"
read -r _initialize
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2025-03-26","capabilities":{"tools":{}}}}'
read -r _initialized
read -r _list
printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo","inputSchema":{"type":"object"}}]}}'
read -r _first
read -r _second
printf '%s\n' '{"jsonrpc":"2.0","id":4,"result":{"content":[{"type":"text","text":"fourth"}]}}'
printf '%s\n' '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"third"}]}}'
read -r _eof
"#;

const STALLING_SERVER: &str = r#"
read -r _initialize
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2025-03-26","capabilities":{"tools":{}}}}'
read -r _initialized
read -r _list
printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"stall","inputSchema":{"type":"object"}}]}}'
read -r _call
exec sleep 60
"#;

const OUTDATED_SERVER: &str = r#"
read -r _initialize
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"1999-01-01","capabilities":{}}}'
read -r _eof
"#;

#[fixture]
fn connector() -> Arc<dyn SessionConnector> {
    Arc::new(ConnectorRegistry::with_stdio(StdioConnector::new()))
}

fn shell_server(name: &str, script: &str) -> ServerDescriptor {
    let locator = StdioLocator::new("sh")
        .expect("valid command")
        .with_args(["-c".to_owned(), script.to_owned()]);
    ServerDescriptor::new(
        ServerName::new(name).expect("valid server name"),
        ServerLocator::Stdio(locator),
    )
}

fn connection(
    connector: Arc<dyn SessionConnector>,
    descriptor: ServerDescriptor,
) -> ServerConnection<DefaultClock> {
    ServerConnection::new(descriptor, connector, Arc::new(DefaultClock))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn scripted_process_handshakes_lists_and_calls(connector: Arc<dyn SessionConnector>) {
    let secrets: SecretEnv = [("SCRIPTED_TOKEN".to_owned(), "secret-1".to_owned())]
        .into_iter()
        .collect();
    let registry = ClientRegistry::new(connector, Arc::new(DefaultClock), ClientSettings::default());
    let agent = AgentId::new("kairos").expect("valid agent id");

    let usable = registry
        .add_agent(
            agent.clone(),
            vec![shell_server("scripted", SCRIPTED_SERVER).with_secrets(secrets)],
            1,
            CONNECT_TIMEOUT,
        )
        .await
        .expect("registration");
    assert!(usable);

    let client = registry.client(&agent).await.expect("client registered");
    let tools = client.available_tools().await;
    assert_eq!(tools.len(), 1);
    let echo = tools.first().expect("echo tool");
    assert_eq!(echo.name(), "echo");
    assert_eq!(echo.description(), Some("token secret-1"));

    let result = registry
        .call_tool(&agent, "echo", json!({"text": "hello"}))
        .await
        .expect("call succeeds");
    assert_eq!(
        result,
        json!({"content": [{"type": "text", "text": "echoed"}], "isError": false})
    );

    let teardown = registry.remove_agent(&agent).await.expect("agent removed");
    assert!(teardown.is_clean());
}

async fn registered_agent(
    connector: Arc<dyn SessionConnector>,
    name: &str,
    script: &str,
) -> (Arc<ClientRegistry<DefaultClock>>, AgentId) {
    let registry = Arc::new(ClientRegistry::new(
        connector,
        Arc::new(DefaultClock),
        ClientSettings::default(),
    ));
    let agent = AgentId::new("kairos").expect("valid agent id");
    let usable = registry
        .add_agent(agent.clone(), vec![shell_server(name, script)], 1, CONNECT_TIMEOUT)
        .await
        .expect("registration");
    assert!(usable);
    (registry, agent)
}

fn first_text(result: &serde_json::Value) -> Option<&str> {
    result
        .get("content")?
        .get(0)?
        .get("text")?
        .as_str()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_calls_share_one_session(connector: Arc<dyn SessionConnector>) {
    let (registry, agent) = registered_agent(connector, "parallel", PARALLEL_SERVER).await;

    let both = tokio::time::timeout(CONNECT_TIMEOUT, async {
        tokio::join!(
            registry.call_tool(&agent, "echo", json!({"n": 1})),
            registry.call_tool(&agent, "echo", json!({"n": 2})),
        )
    })
    .await
    .expect("calls are answered while both are in flight");

    let first = both.0.expect("first call succeeds");
    let second = both.1.expect("second call succeeds");
    let mut texts = vec![first_text(&first), first_text(&second)];
    texts.sort_unstable();
    assert_eq!(texts, vec![Some("fourth"), Some("third")]);
    registry.remove_agent(&agent).await.expect("agent removed");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn removing_an_agent_interrupts_a_stalled_call(connector: Arc<dyn SessionConnector>) {
    let (registry, agent) = registered_agent(connector, "stalling", STALLING_SERVER).await;
    let call = tokio::spawn({
        let shared = Arc::clone(&registry);
        let id = agent.clone();
        async move { shared.call_tool(&id, "stall", json!({})).await }
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let teardown = tokio::time::timeout(Duration::from_secs(10), registry.remove_agent(&agent))
        .await
        .expect("teardown does not wait for the stalled call")
        .expect("agent removed");
    let outcome = tokio::time::timeout(Duration::from_secs(1), call)
        .await
        .expect("stalled call is released")
        .expect("call task joins");

    assert!(teardown.is_clean());
    assert!(matches!(
        outcome,
        Err(McpClientError::CallFailed {
            source: SessionError::Closed,
            ..
        })
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unsupported_protocol_version_fails_handshake(connector: Arc<dyn SessionConnector>) {
    let server = connection(connector, shell_server("outdated", OUTDATED_SERVER));

    let result = server.connect(CONNECT_TIMEOUT).await;

    assert!(matches!(
        result,
        Err(McpClientError::ConnectFailed {
            source: SessionError::ProtocolMismatch(_),
            ..
        })
    ));
    assert_eq!(server.state().await, ConnectionState::Failed);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn silent_process_times_out(connector: Arc<dyn SessionConnector>) {
    let server = connection(connector, shell_server("silent", "exec sleep 30"));

    let result = server.connect(Duration::from_millis(300)).await;

    assert!(matches!(result, Err(McpClientError::ConnectTimeout { .. })));
    assert_eq!(server.state().await, ConnectionState::Failed);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn process_exiting_early_fails_handshake(connector: Arc<dyn SessionConnector>) {
    let server = connection(connector, shell_server("quitter", "exit 3"));

    let result = server.connect(CONNECT_TIMEOUT).await;

    assert!(matches!(result, Err(McpClientError::ConnectFailed { .. })));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_python_module_is_a_launch_failure() {
    let dir = tempfile::tempdir().expect("temp dir");
    let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
    let connector: Arc<dyn SessionConnector> = Arc::new(ConnectorRegistry::with_stdio(
        StdioConnector::new().with_base_dir(base),
    ));
    let descriptor = ServerDescriptor::new(
        ServerName::new("fileio").expect("valid server name"),
        ServerLocator::python("fileio.py").expect("valid module"),
    );
    let server = connection(connector, descriptor);

    let result = server.connect(CONNECT_TIMEOUT).await;

    assert!(matches!(
        result,
        Err(McpClientError::ConnectFailed {
            source: SessionError::Spawn(_),
            ..
        })
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_executable_is_a_launch_failure(connector: Arc<dyn SessionConnector>) {
    let descriptor = ServerDescriptor::new(
        ServerName::new("ghost").expect("valid server name"),
        ServerLocator::stdio("switchyard-no-such-binary").expect("valid command"),
    );
    let server = connection(connector, descriptor);

    let result = server.connect(CONNECT_TIMEOUT).await;

    assert!(matches!(
        result,
        Err(McpClientError::ConnectFailed {
            source: SessionError::Spawn(_),
            ..
        })
    ));
}
