//! Alert lifecycle and channel dispatch tests

use std::time::Duration;

use eddn_hub::monitoring::errors::Severity;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{spawn_stack, spawn_test_api};

#[tokio::test]
async fn webhook_channel_delivers_alert_payload() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let stack = spawn_stack(
        Duration::from_secs(60),
        Some(format!("{}/hook", mock_server.uri())),
    );

    stack
        .monitor
        .alerting
        .trigger(
            "Storage degraded",
            "flush failures accumulating",
            Severity::High,
            vec!["webhook".to_string(), "log".to_string()],
            None,
        )
        .await
        .unwrap();

    // Webhook delivery happens off the actor loop
    tokio::time::sleep(Duration::from_millis(200)).await;

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["title"], "Storage degraded");
    assert_eq!(body["severity"], "high");
    assert!(body["alertId"].as_str().unwrap().starts_with("alert-"));
}

#[tokio::test]
async fn webhook_failure_does_not_block_other_channels() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let stack = spawn_stack(Duration::from_secs(60), Some(mock_server.uri()));

    let id = stack
        .monitor
        .alerting
        .trigger(
            "Test",
            "msg",
            Severity::Medium,
            vec!["webhook".to_string(), "log".to_string()],
            None,
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    // The alert exists and is manageable despite the failing endpoint
    let report = stack.monitor.alerting.list().await.unwrap();
    assert_eq!(report.stats.active, 1);
    assert!(stack.monitor.alerting.acknowledge(&id).await.is_ok());
}

#[tokio::test]
async fn acknowledge_over_api_and_double_ack_fails() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = spawn_test_api(&stack).await;

    let id = stack
        .monitor
        .alerting
        .trigger("High error rate", "40%", Severity::High, vec![], None)
        .await
        .unwrap();

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/monitoring/alerts/{id}/acknowledge");

    let first = client.post(&url).send().await.unwrap();
    assert_eq!(first.status(), 200);
    let body: Value = first.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["state"], "acknowledged");
    assert!(body["data"]["acknowledgedAt"].is_string());

    // Second acknowledge is a local failure, not a crash
    let second = client.post(&url).send().await.unwrap();
    assert_eq!(second.status(), 400);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("already acknowledged"));
}

#[tokio::test]
async fn acknowledge_unknown_alert_returns_not_found() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = spawn_test_api(&stack).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/monitoring/alerts/alert-999/acknowledge"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn critical_tracked_error_raises_alert_visible_over_api() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = spawn_test_api(&stack).await;

    stack
        .monitor
        .track_error("storage", "database unavailable", "health probe")
        .await
        .unwrap();

    let body: Value = reqwest::get(format!("http://{addr}/api/monitoring/alerts"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["stats"]["active"], 1);
    assert_eq!(body["data"]["alerts"][0]["severity"], "critical");
}
