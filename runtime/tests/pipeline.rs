//! End-to-end tests: actions in, requests on the transport, success/failure actions out.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect
#![allow(clippy::panic)] // Tests can panic

use futures::channel::mpsc;
use futures::stream::{self, StreamExt};
use record_relay_core::action::Action;
use record_relay_core::combinators::StartupGate;
use record_relay_core::interpret::WirePayload;
use record_relay_core::naming::HttpMethod;
use record_relay_runtime::config::RecordsConfig;
use record_relay_runtime::{RecordsError, RecordsRuntime, RecordsSources, Sink, cycle_records};
use record_relay_testing::{CycleTest, InMemoryTransport, fixtures};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

const CONFIG_WITH_ACTIONS: &str = r#"
[cycle.drivers]
api = "HTTP"

[api]
protocol = "http"
host = "localhost"
port = 8080
root = "/api/"

[[actions]]
root = "sample"
model = "cities"
verb = "FETCH"
scope = ["user"]

[[actions]]
root = "sample"
model = "cities"
verb = "ADD"
scope = ["user"]
"#;

fn config() -> RecordsConfig {
    RecordsConfig::from_toml_str(CONFIG_WITH_ACTIONS).unwrap()
}

async fn next_action(rx: &mut broadcast::Receiver<Action>) -> Action {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for an action")
        .unwrap()
}

#[tokio::test]
async fn fetch_request_round_trips_to_success() {
    let transport = Arc::new(InMemoryTransport::new());
    let runtime = Arc::new(RecordsRuntime::new(transport.clone()));
    let mut emitted = runtime.subscribe();
    let (actions_tx, actions_rx) = mpsc::unbounded();

    let task = {
        let runtime = Arc::clone(&runtime);
        tokio::spawn(async move { runtime.start(config(), actions_rx.boxed()).await })
    };

    actions_tx
        .unbounded_send(Action::new(
            "sample/cities/FETCH_REQUEST",
            json!({"name": "Paris", "user": "123"}),
        ))
        .unwrap();

    let action = next_action(&mut emitted).await;
    assert_eq!(action.action_type.as_str(), "sample/cities/FETCH_SUCCESS");
    assert_eq!(action.payload()["data"], json!([]));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Get);
    assert_eq!(requests[0].url, "http://localhost:8080/api/cities");

    task.abort();
}

#[tokio::test]
async fn add_request_becomes_patch_and_failure() {
    let transport = Arc::new(InMemoryTransport::failing());
    let runtime = Arc::new(RecordsRuntime::new(transport.clone()));
    let mut emitted = runtime.subscribe();
    let (actions_tx, actions_rx) = mpsc::unbounded();

    let task = {
        let runtime = Arc::clone(&runtime);
        tokio::spawn(async move { runtime.start(config(), actions_rx.boxed()).await })
    };

    actions_tx
        .unbounded_send(Action::new(
            "sample/cities/ADD_REQUEST",
            json!([{"name": "Paris", "user": "123"}]),
        ))
        .unwrap();

    let action = next_action(&mut emitted).await;
    assert_eq!(action.action_type.as_str(), "sample/cities/ADD_FAILURE");
    assert_eq!(action.payload()["status"], json!(500));
    assert_eq!(action.payload()["message"], json!("Internal Server Error"));

    let requests = transport.requests();
    assert_eq!(requests[0].method, HttpMethod::Patch);
    assert_eq!(requests[0].url, "http://localhost:8080/api");
    let WirePayload::Query(query) = &requests[0].payload else {
        panic!("expected a patch query");
    };
    assert_eq!(query.op, "add");
    assert_eq!(query.path, "/cities");
    assert_eq!(query.value, json!([{"name": "Paris", "user": "123"}]));

    task.abort();
}

#[tokio::test]
async fn unsupported_driver_stops_the_runtime() {
    let mut config = config();
    config.cycle.drivers.api = "WEBSOCKET".to_string();

    let transport = Arc::new(InMemoryTransport::new());
    let runtime = RecordsRuntime::new(transport.clone());
    let actions = stream::iter([Action::new("sample/cities/FETCH_REQUEST", json!({}))]).boxed();

    let result = timeout(Duration::from_secs(2), runtime.start(config, actions))
        .await
        .expect("runtime did not stop");

    let err = result.unwrap_err();
    assert!(matches!(err, RecordsError::UnsupportedDriver(ref driver) if driver == "WEBSOCKET"));
    assert_eq!(err.to_string(), "Unsupported driver key WEBSOCKET");
    assert!(transport.is_empty());
}

#[tokio::test]
async fn invalid_config_is_rejected_before_running() {
    let mut config = config();
    config.api.host = String::new();

    let runtime = RecordsRuntime::new(Arc::new(InMemoryTransport::new()));
    let err = runtime.start(config, stream::empty().boxed()).await.unwrap_err();
    assert!(matches!(err, RecordsError::Settings(_)));
}

#[tokio::test]
async fn buffered_actions_wait_for_late_config() {
    let (config_tx, config_rx) = mpsc::unbounded();
    let (actions_tx, actions_rx) = mpsc::unbounded();
    let source = fixtures::sample_source();

    let mut sinks = cycle_records(RecordsSources {
        config: config_rx.boxed(),
        action_config: stream::iter([Arc::new(source.action_config)]).boxed(),
        actions: actions_rx.boxed(),
        responses: stream::empty().boxed(),
        gate: StartupGate::Buffer,
    });

    actions_tx
        .unbounded_send(Action::new("sample/cities/FETCH_REQUEST", json!({})))
        .unwrap();
    drop(actions_tx);
    config_tx.unbounded_send(Arc::new(source.config)).unwrap();

    let sink = timeout(Duration::from_secs(2), sinks.next()).await.unwrap();
    let request = tokio_test::assert_ok!(sink.unwrap());
    assert!(matches!(request, Sink::Http(request) if request.url == "http://localhost:8080/api/cities"));
}

#[tokio::test]
async fn requests_and_responses_are_routed_together() {
    let configs = fixtures::sample_action_configs();
    let objs = fixtures::sample_objs();
    let request = fixtures::sample_request(
        &fixtures::sample_config(),
        &configs[2],
        &fixtures::scope_values(),
        &objs[fixtures::PROJECT_LOCATIONS],
    );

    CycleTest::new()
        .given_source(fixtures::sample_source())
        .when_action(Action::new(
            "sample/projectLocations/REMOVE_REQUEST",
            json!([{"id": 10, "user": "123", "project": "456"}]),
        ))
        .when_response(fixtures::sample_success_response(
            &request,
            &objs[fixtures::PROJECT_LOCATIONS],
        ))
        .then_requests(|requests| {
            assert_eq!(requests.len(), 1);
            let WirePayload::Query(query) = &requests[0].payload else {
                panic!("expected a patch query");
            };
            assert_eq!(query.op, "remove");
            assert_eq!(query.path, "/projectLocations");
        })
        .then_actions(|actions| {
            assert_eq!(actions.len(), 1);
            assert_eq!(
                actions[0].action_type.as_str(),
                "sample/projectLocations/ADD_SUCCESS"
            );
        })
        .run()
        .await;
}
