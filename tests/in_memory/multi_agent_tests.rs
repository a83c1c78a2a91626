//! Several agents sharing one registry.

use super::helpers::{Harness, agent, descriptor, harness, server_name};
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use switchyard::mcp_client::{McpClientError, adapters::ScriptedServer};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn agents_register_concurrently_with_separate_sessions(harness: Harness) {
    harness.serve("fileio", &["read_file"]);
    harness.serve("calendar", &["list_events"]);

    let registrations = ["kairos", "chronos", "aion"].map(|name| {
        let registry = Arc::clone(&harness.registry);
        tokio::spawn(async move {
            registry
                .add_agent(
                    agent(name),
                    vec![descriptor("fileio"), descriptor("calendar")],
                    2,
                    CONNECT_TIMEOUT,
                )
                .await
        })
    });
    for registration in registrations {
        let usable = registration
            .await
            .expect("task joins")
            .expect("registration succeeds");
        assert!(usable);
    }

    assert_eq!(harness.registry.agent_ids().await.len(), 3);
    let fileio = server_name("fileio");
    assert_eq!(harness.connector.open_count(&fileio).expect("count readable"), 3);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn calls_are_routed_within_the_calling_agent(harness: Harness) {
    harness.serve("fileio", &["read_file"]);
    harness.serve("calendar", &["list_events"]);
    harness
        .registry
        .add_agent(agent("kairos"), vec![descriptor("fileio")], 1, CONNECT_TIMEOUT)
        .await
        .expect("registration");
    harness
        .registry
        .add_agent(agent("chronos"), vec![descriptor("calendar")], 1, CONNECT_TIMEOUT)
        .await
        .expect("registration");

    let own = harness
        .registry
        .call_tool(&agent("chronos"), "list_events", json!({}))
        .await
        .expect("chronos owns list_events");
    let foreign = harness
        .registry
        .call_tool(&agent("chronos"), "read_file", json!({}))
        .await;

    assert_eq!(own.get("server"), Some(&json!("calendar")));
    assert!(matches!(foreign, Err(McpClientError::UnknownTool { .. })));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn one_agent_failing_does_not_affect_another(harness: Harness) {
    harness.serve("fileio", &["read_file"]);
    harness.script("broken", ScriptedServer::new().refusing("bad config"));

    let broken = harness
        .registry
        .add_agent(agent("kairos"), vec![descriptor("broken")], 1, CONNECT_TIMEOUT)
        .await
        .expect("registration");
    let healthy = harness
        .registry
        .add_agent(agent("chronos"), vec![descriptor("fileio")], 1, CONNECT_TIMEOUT)
        .await
        .expect("registration");

    assert!(!broken);
    assert!(healthy);
    let summary = harness.registry.status_summary().await;
    let kairos = summary.get(&agent("kairos")).expect("kairos status");
    let chronos = summary.get(&agent("chronos")).expect("chronos status");
    assert_eq!(kairos.failed_count(), 1);
    assert_eq!(chronos.connected_count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_reports_close_failures_without_aborting(harness: Harness) {
    harness.script(
        "flaky",
        ScriptedServer::new().with_close_error("stdin already closed"),
    );
    harness.serve("fileio", &["read_file"]);
    for (name, server) in [("kairos", "flaky"), ("chronos", "fileio")] {
        harness
            .registry
            .add_agent(agent(name), vec![descriptor(server)], 1, CONNECT_TIMEOUT)
            .await
            .expect("registration");
    }

    let report = harness.registry.shutdown().await;

    assert!(!report.is_clean());
    assert_eq!(report.clean_agents, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.timed_out.is_empty());
    assert!(harness.registry.agent_ids().await.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn agent_can_be_registered_again_after_removal(harness: Harness) {
    harness.serve("fileio", &["read_file"]);
    let kairos = agent("kairos");
    harness
        .registry
        .add_agent(kairos.clone(), vec![descriptor("fileio")], 1, CONNECT_TIMEOUT)
        .await
        .expect("first registration");
    harness
        .registry
        .remove_agent(&kairos)
        .await
        .expect("removal");

    let usable = harness
        .registry
        .add_agent(kairos.clone(), vec![descriptor("fileio")], 1, CONNECT_TIMEOUT)
        .await
        .expect("second registration");

    assert!(usable);
    let fileio = server_name("fileio");
    assert_eq!(harness.connector.open_count(&fileio).expect("count readable"), 2);
    assert_eq!(harness.connector.close_count(&fileio).expect("count readable"), 1);
}
