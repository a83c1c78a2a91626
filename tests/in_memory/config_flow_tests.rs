//! Agents registered from configuration files on disk.

use super::helpers::{Harness, agent, harness, server_name};
use camino::{Utf8Path, Utf8PathBuf};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use std::time::Duration;
use switchyard::mcp_client::{
    adapters::{ConfigFileError, ConfigFileLoader},
    domain::{ClientDomainError, CommandSecrets, LocatorKind, TieBreakPolicy},
};
use tempfile::TempDir;

struct ConfigDir {
    _temp: TempDir,
    root: Utf8PathBuf,
}

impl ConfigDir {
    fn write(&self, name: &str, value: &Value) {
        let text = serde_json::to_string_pretty(value).expect("serializable document");
        std::fs::write(self.root.join(name), text).expect("config file written");
    }

    fn write_raw(&self, name: &str, text: &str) {
        std::fs::write(self.root.join(name), text).expect("config file written");
    }

    fn loader(&self) -> ConfigFileLoader {
        ConfigFileLoader::open(self.root.clone()).expect("config dir opens")
    }
}

#[fixture]
fn config_dir() -> ConfigDir {
    let temp = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp path");
    ConfigDir { _temp: temp, root }
}

#[rstest]
fn descriptors_carry_secrets_config_and_timeouts(config_dir: ConfigDir) {
    config_dir.write(
        "commands.json",
        &json!({
            "mcp_commands": [
                {
                    "python_code_module": "tools/fileio.py",
                    "config": {"root": "/srv/files"},
                    "connect_timeout_ms": 1500
                },
                {"command": "npx", "args": ["-y", "timely-mcp"], "server_name": "timely"},
                {"node_code_module": "tools/calendar.js", "enabled": false}
            ]
        }),
    );
    config_dir.write(
        "secrets.json",
        &json!({
            "timely": {"TIMELY_TOKEN": "t-123"},
            "tools/fileio.py": {"FILEIO_KEY": "k-456"}
        }),
    );

    let descriptors = config_dir
        .loader()
        .load_descriptors(
            Utf8Path::new("commands.json"),
            Some(Utf8Path::new("secrets.json")),
        )
        .expect("descriptors load");

    assert_eq!(descriptors.len(), 2);
    let fileio = descriptors.first().expect("fileio descriptor");
    assert_eq!(fileio.name().as_str(), "fileio");
    assert_eq!(fileio.locator().kind(), LocatorKind::Python);
    assert_eq!(fileio.config(), Some(&json!({"root": "/srv/files"})));
    assert_eq!(fileio.connect_timeout(), Some(Duration::from_millis(1500)));
    assert_eq!(
        fileio.secrets().iter().collect::<Vec<_>>(),
        vec![("FILEIO_KEY", "k-456")]
    );

    let timely = descriptors.get(1).expect("timely descriptor");
    assert_eq!(timely.name().as_str(), "timely");
    assert_eq!(timely.locator().kind(), LocatorKind::Stdio);
    assert_eq!(
        timely.secrets().iter().collect::<Vec<_>>(),
        vec![("TIMELY_TOKEN", "t-123")]
    );
}

#[rstest]
fn settings_file_fills_missing_fields_with_defaults(config_dir: ConfigDir) {
    config_dir.write(
        "settings.json",
        &json!({"max_concurrent_connections": 3, "tie_break": "configuration_order"}),
    );

    let settings = config_dir
        .loader()
        .load_settings(Utf8Path::new("settings.json"))
        .expect("settings load");

    assert_eq!(settings.max_concurrent_connections(), 3);
    assert_eq!(settings.tie_break(), TieBreakPolicy::ConfigurationOrder);
    assert_eq!(settings.connect_timeout(), Duration::from_secs(10));
    assert_eq!(settings.call_timeout(), None);
}

#[rstest]
fn missing_file_is_an_io_error(config_dir: ConfigDir) {
    let result = config_dir
        .loader()
        .load_commands(Utf8Path::new("absent.json"));

    assert!(matches!(result, Err(ConfigFileError::Io { .. })));
}

#[rstest]
fn paths_cannot_escape_the_config_root(config_dir: ConfigDir) {
    let result = config_dir
        .loader()
        .load_commands(Utf8Path::new("../commands.json"));

    assert!(matches!(result, Err(ConfigFileError::Io { .. })));
}

#[rstest]
fn malformed_json_is_a_parse_error(config_dir: ConfigDir) {
    config_dir.write_raw("commands.json", "{ \"mcp_commands\": [ ");

    let result = config_dir
        .loader()
        .load_commands(Utf8Path::new("commands.json"));

    assert!(matches!(result, Err(ConfigFileError::Parse { .. })));
}

#[rstest]
fn colliding_server_names_are_rejected(config_dir: ConfigDir) {
    config_dir.write(
        "commands.json",
        &json!({
            "mcp_commands": [
                {"python_code_module": "a/fileio.py"},
                {"python_code_module": "b/fileio.py"}
            ]
        }),
    );

    let result = config_dir
        .loader()
        .load_descriptors(Utf8Path::new("commands.json"), None);

    assert!(matches!(
        result,
        Err(ConfigFileError::Domain(ClientDomainError::DuplicateServerName(_)))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn agent_registered_from_files_routes_to_derived_servers(
    config_dir: ConfigDir,
    harness: Harness,
) {
    config_dir.write(
        "commands.json",
        &json!({
            "mcp_commands": [
                {"python_code_module": "tools/fileio.py"},
                {"node_code_module": "tools/calendar.js"},
                {"python_code_module": "tools/fileio.py"}
            ]
        }),
    );
    harness.serve("fileio", &["read_file"]);
    harness.serve("calendar", &["list_events"]);
    let loader = config_dir.loader();
    let commands = loader
        .load_commands(Utf8Path::new("commands.json"))
        .expect("commands load");
    let kairos = agent("kairos");

    let usable = harness
        .registry
        .add_agent_from_config(kairos.clone(), &commands, &CommandSecrets::new())
        .await
        .expect("registration");

    assert!(usable);
    let client = harness.registry.client(&kairos).await.expect("client");
    assert_eq!(
        client.server_names(),
        vec![server_name("fileio"), server_name("calendar")]
    );
    let fileio = server_name("fileio");
    assert_eq!(harness.connector.open_count(&fileio).expect("count readable"), 1);
}
