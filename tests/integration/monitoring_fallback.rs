//! Degrade-gracefully behavior of the monitoring surface

use std::time::Duration;

use serde_json::Value;

use crate::helpers::{spawn_stack, spawn_test_api};

#[tokio::test]
async fn dashboard_stays_up_when_performance_tracker_dies() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = spawn_test_api(&stack).await;

    stack.monitor.performance.shutdown().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let response = reqwest::get(format!("http://{addr}/api/monitoring/dashboard"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    // Contract: still a success envelope, fully populated, marked fallback
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["fallback"], true);
    assert_eq!(body["data"]["errorRate"], 0.0);
    assert_eq!(body["data"]["activeAlerts"], 0);
    assert!(body["data"]["systemHealth"].is_string());
    assert!(body["data"]["uptime"].is_string());
}

#[tokio::test]
async fn health_endpoint_falls_back_when_storage_actor_dies() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = spawn_test_api(&stack).await;

    stack.storage.shutdown().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let response = reqwest::get(format!("http://{addr}/api/health")).await.unwrap();
    assert_eq!(response.status(), 200);

    // Legacy endpoint: direct payload, no envelope
    let body: Value = response.json().await.unwrap();
    assert!(body.get("success").is_none());
    assert_eq!(body["fallback"], true);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn healthy_system_reports_detailed_checks() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = spawn_test_api(&stack).await;

    let body: Value = reqwest::get(format!("http://{addr}/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["fallback"], false);
    assert_eq!(body["checks"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn persistence_failure_surfaces_in_error_report_not_ingestion() {
    let stack = spawn_stack(Duration::from_secs(60), None);

    stack
        .monitor
        .track_error("persistence", "flush failed: disk full", "storage flush")
        .await
        .unwrap();

    let report = stack
        .monitor
        .errors
        .query(chrono::Utc::now() - chrono::Duration::minutes(1), None)
        .await
        .unwrap();

    assert_eq!(report.summary.total_errors, 1);
    assert_eq!(report.errors[0].error_type, "persistence");
}
