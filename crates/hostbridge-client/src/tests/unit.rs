//! Unit tests for request exchange and statistics.

use std::thread;
use std::time::Duration;

use rstest::{fixture, rstest};
use serde_json::{Value, json};

use hostbridge_config::{ClientConfig, Endpoint};
use hostbridge_protocol::{Command, Response};

use super::support::{FakeBridge, ReplyMode, refused_endpoint};
use crate::{BridgeClient, CheckState, ClientError, LinkStatus};

fn client_for(endpoint: Endpoint) -> BridgeClient {
    BridgeClient::new(ClientConfig {
        retry_delay_ms: 0,
        response_timeout_secs: 1,
        ..ClientConfig::with_endpoint(endpoint)
    })
}

#[fixture]
fn heartbeat_bridge() -> FakeBridge {
    FakeBridge::start(ReplyMode::Reply(Response::heartbeat()))
}

#[rstest]
fn heartbeat_round_trip_updates_statistics(heartbeat_bridge: FakeBridge) {
    let client = client_for(heartbeat_bridge.endpoint());
    let response = client.send(&Command::heartbeat()).expect("send");
    assert!(response.is_heartbeat());

    let stats = client.statistics();
    assert_eq!(stats.current_status, LinkStatus::Connected);
    assert_eq!(stats.connection_stats.total_attempts, 1);
    assert_eq!(stats.connection_stats.successful, 1);
    assert_eq!(stats.performance.total_recorded_responses, 1);
    assert!(stats.last_successful_command.is_some());
}

#[rstest]
fn error_responses_are_returned_as_responses() {
    let bridge = FakeBridge::start(ReplyMode::Reply(Response::error(
        "Unknown command type: bogus",
    )));
    let client = client_for(bridge.endpoint());
    let response = client.send(&Command::new("bogus")).expect("send");
    assert_eq!(response.message(), Some("Unknown command type: bogus"));
    assert_eq!(client.monitor().successful_connections, 1);
}

#[rstest]
fn silent_bridge_times_out() {
    let bridge = FakeBridge::start(ReplyMode::Silent);
    let client = client_for(bridge.endpoint());
    let error = client.send(&Command::new("slow")).expect_err("timeout");
    assert!(matches!(error, ClientError::Timeout { .. }), "{error}");
}

#[rstest]
fn success_data_is_returned() {
    let bridge = FakeBridge::start(ReplyMode::Reply(Response::success(json!(1))));
    let client = client_for(bridge.endpoint());
    let response = client.send(&Command::new("count")).expect("send");
    assert_eq!(response.data(), Some(&json!(1)));
}

#[rstest]
fn failed_check_marks_link_error() {
    let bridge = FakeBridge::start(ReplyMode::Reply(Response::error("busy")));
    let client = client_for(bridge.endpoint());
    let status = client.check_connection();
    assert!(!status.connected);
    assert_eq!(status.status, CheckState::Error);
    assert_eq!(status.error.as_deref(), Some("busy"));
    assert_eq!(client.monitor().status, LinkStatus::Error);
}

#[rstest]
fn healthy_check_records_heartbeat(heartbeat_bridge: FakeBridge) {
    let client = client_for(heartbeat_bridge.endpoint());
    let status = client.check_connection();
    assert!(status.connected);
    assert_eq!(status.status, CheckState::Healthy);
    assert!(client.statistics().last_heartbeat.is_some());

    let requests = heartbeat_bridge.requests();
    let request: Value = serde_json::from_str(requests.first().expect("a request"))
        .expect("request json");
    assert_eq!(request["type"], "heartbeat");
    assert_eq!(request["_health_check"], true);
}

#[rstest]
fn response_times_exclude_retry_delay() {
    let endpoint = refused_endpoint();
    let client = BridgeClient::new(ClientConfig {
        retry_delay_ms: 600,
        connect_attempts: 3,
        response_timeout_secs: 2,
        ..ClientConfig::with_endpoint(endpoint.clone())
    });
    let late_start = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        FakeBridge::start_on(&endpoint, ReplyMode::Reply(Response::heartbeat()))
    });

    client.send(&Command::heartbeat()).expect("send after retry");
    let bridge = late_start.join().expect("bridge thread");

    let stats = client.statistics();
    assert_eq!(bridge.accepted(), 1);
    assert_eq!(stats.connection_stats.total_attempts, 2);
    let round_trip = stats.performance.recent_response_times_ms[0];
    assert!(round_trip < 500.0, "round trip included backoff: {round_trip}ms");
}

#[rstest]
fn detailed_status_names_the_endpoint(heartbeat_bridge: FakeBridge) {
    let client = client_for(heartbeat_bridge.endpoint());
    let detailed = client.detailed_status();
    assert!(detailed.connection_check.connected);
    assert_eq!(detailed.server_info.host, "127.0.0.1");
    assert_eq!(detailed.server_info.port, heartbeat_bridge.endpoint().port);
    assert_eq!(detailed.statistics.connection_stats.successful, 1);
}

#[rstest]
fn reset_clears_counters(heartbeat_bridge: FakeBridge) {
    let client = client_for(heartbeat_bridge.endpoint());
    client.send(&Command::heartbeat()).expect("send");
    client.reset_statistics();

    let stats = client.statistics();
    assert_eq!(stats.connection_stats.total_attempts, 0);
    assert_eq!(stats.performance.total_recorded_responses, 0);
    assert!(stats.performance.recent_response_times_ms.is_empty());
}
