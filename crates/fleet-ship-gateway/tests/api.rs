//! End-to-end tests of the HTTP API against an in-memory fleet.
//!
//! Run with:
//!   cargo test -p fleet-ship-gateway --test api

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderValue, StatusCode};
use axum_test::TestServer;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use fleet_ship_client::mock::{FleetCall, MockFleet};
use fleet_ship_client::JobState;
use fleet_ship_control::{ControlConfig, Dispatcher, EmptyMatchPolicy};
use fleet_ship_gateway::{create_router, BasicAuthConfig, GatewayConfig, GatewayState};

// =============================================================================
// Helpers
// =============================================================================

fn control_config() -> ControlConfig {
    ControlConfig {
        poll_interval_ms: 10,
        ..ControlConfig::default()
    }
}

fn server_with(
    fleet: &Arc<MockFleet>,
    control: ControlConfig,
    basic_auth: Option<BasicAuthConfig>,
) -> TestServer {
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(fleet), control));
    let config = GatewayConfig {
        basic_auth,
        ..GatewayConfig::default()
    };
    TestServer::new(create_router(GatewayState::new(dispatcher, config))).unwrap()
}

fn server(fleet: &Arc<MockFleet>) -> TestServer {
    server_with(fleet, control_config(), None)
}

fn basic(user: &str, pass: &str) -> HeaderValue {
    let encoded = STANDARD.encode(format!("{user}:{pass}"));
    HeaderValue::from_str(&format!("Basic {encoded}")).unwrap()
}

/// Wait until `name` has received `expected` target states.
async fn wait_for_mutations(fleet: &MockFleet, name: &str, expected: &[JobState]) {
    for _ in 0..200 {
        if fleet.mutations(name) == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "{name} never received {expected:?}, got {:?}",
        fleet.mutations(name)
    );
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn healthcheck_reports_healthy() {
    let fleet = Arc::new(MockFleet::new());
    let response = server(&fleet).get("/healthcheck").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["swaps_in_flight"], 0);
    assert!(fleet.calls().is_empty());
}

#[tokio::test]
async fn lists_units_and_machines() {
    let fleet = Arc::new(MockFleet::with_units([
        ("web@1.service", JobState::Launched),
        ("db.service", JobState::Loaded),
    ]));
    fleet.add_machine("m1", "10.0.0.1");
    let server = server(&fleet);

    let units: Value = server.get("/units").await.json();
    assert_eq!(
        units,
        json!([
            {"name": "web@1.service", "options": [], "currentState": "launched"},
            {"name": "db.service", "options": [], "currentState": "loaded"},
        ])
    );

    let machines: Value = server.get("/machines").await.json();
    assert_eq!(
        machines,
        json!([{"id": "m1", "primaryIP": "10.0.0.1", "metadata": {}}])
    );
}

#[tokio::test]
async fn get_unit_appends_service_suffix() {
    let fleet = Arc::new(MockFleet::with_units([("web.service", JobState::Launched)]));
    let server = server(&fleet);

    let response = server.get("/units/web").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["name"], "web.service");
    assert_eq!(body["currentState"], "launched");

    let response = server.get("/units/web.service").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn get_missing_unit_renders_null() {
    let fleet = Arc::new(MockFleet::new());
    let response = server(&fleet).get("/units/ghost").await;

    response.assert_status_ok();
    response.assert_json(&Value::Null);
    assert_eq!(
        fleet.calls(),
        vec![FleetCall::Unit("ghost.service".to_string())]
    );
}

#[tokio::test]
async fn get_unit_reports_fleet_failure() {
    let fleet = Arc::new(MockFleet::with_units([("web.service", JobState::Launched)]));
    fleet.fail_queries("web.service", 1);
    let response = server(&fleet).get("/units/web").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn fleet_failure_is_internal_error() {
    let fleet = Arc::new(MockFleet::new());
    fleet.fail_listing();
    let response = server(&fleet).get("/units").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("injected listing failure"));
}

// =============================================================================
// Unit operations
// =============================================================================

#[tokio::test]
async fn deploy_restarts_matching_instances() {
    let fleet = Arc::new(MockFleet::with_units([
        ("web@1.service", JobState::Launched),
        ("web@2.service", JobState::Launched),
        ("api.service", JobState::Launched),
    ]));
    let response = server(&fleet).put("/deploy/web").await;

    response.assert_status_ok();
    response.assert_json(&json!("Deployment asked"));

    let restart = [JobState::Loaded, JobState::Launched];
    wait_for_mutations(&fleet, "web@1.service", &restart).await;
    wait_for_mutations(&fleet, "web@2.service", &restart).await;
    assert!(fleet.mutations("api.service").is_empty());
}

#[tokio::test]
async fn rebalance_swaps_through_inactive() {
    let fleet = Arc::new(MockFleet::with_units([("web.service", JobState::Launched)]));
    let response = server(&fleet).put("/rebalance/web.service").await;

    response.assert_status_ok();
    response.assert_json(&json!("Rebalancing asked"));

    wait_for_mutations(&fleet, "web.service", &[JobState::Inactive, JobState::Launched]).await;
    assert_eq!(fleet.current_state("web.service"), Some(JobState::Launched));
}

#[tokio::test]
async fn empty_match_is_accepted_by_default() {
    let fleet = Arc::new(MockFleet::with_units([("api.service", JobState::Launched)]));
    let response = server(&fleet).put("/deploy/web").await;

    response.assert_status_ok();
    assert!(fleet.mutations("api.service").is_empty());
}

#[tokio::test]
async fn empty_match_can_be_rejected() {
    let fleet = Arc::new(MockFleet::new());
    let control = ControlConfig {
        empty_match: EmptyMatchPolicy::Reject,
        ..control_config()
    };
    let response = server_with(&fleet, control, None).put("/rebalance/web").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "no units match web.service");
}

#[tokio::test]
async fn discovery_failure_is_reported() {
    let fleet = Arc::new(MockFleet::new());
    fleet.fail_listing();
    let response = server(&fleet).put("/deploy/web").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(fleet.calls().iter().all(|c| !matches!(
        c,
        FleetCall::SetTargetState(..)
    )));
}

#[tokio::test]
async fn operations_list_stuck_swaps() {
    let fleet = Arc::new(MockFleet::with_units([("web.service", JobState::Launched)]));
    fleet.freeze_states();
    let server = server(&fleet);

    server.put("/deploy/web").await.assert_status_ok();
    wait_for_mutations(&fleet, "web.service", &[JobState::Loaded]).await;

    let body: Value = server.get("/operations").await.json();
    let operations = body["operations"].as_array().unwrap();
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0]["unit"], "web.service");
    assert_eq!(operations[0]["operation"], "restart");
    assert_eq!(operations[0]["phase"], "awaiting_first");

    // A second request for the same unit does not start another swap.
    server.put("/deploy/web").await.assert_status_ok();
    let body: Value = server.get("/operations").await.json();
    assert_eq!(body["operations"].as_array().unwrap().len(), 1);
    assert_eq!(fleet.mutations("web.service"), vec![JobState::Loaded]);
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn basic_auth_guards_everything_but_healthcheck() {
    let fleet = Arc::new(MockFleet::with_units([("web.service", JobState::Launched)]));
    let auth = BasicAuthConfig {
        username: "ops".into(),
        password: "s3cret".into(),
    };
    let server = server_with(&fleet, control_config(), Some(auth));

    server.get("/healthcheck").await.assert_status_ok();

    let response = server.get("/units").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.header("www-authenticate"),
        "Basic realm=\"fleet-ship\""
    );

    server
        .put("/deploy/web")
        .add_header(AUTHORIZATION, basic("ops", "wrong"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    assert!(fleet.mutations("web.service").is_empty());

    server
        .get("/units/web")
        .add_header(AUTHORIZATION, basic("ops", "s3cret"))
        .await
        .assert_status_ok();
}
