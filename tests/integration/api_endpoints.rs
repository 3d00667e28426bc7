//! REST endpoint tests against a live server on a random port

use std::time::Duration;

use eddn_hub::storage::schema::{MaterialType, MiningSiteRow, SiteType};
use serde_json::Value;

use crate::helpers::{commodity_envelope, mining_envelope, spawn_stack, spawn_test_api};

async fn get_json(addr: std::net::SocketAddr, path: &str) -> (reqwest::StatusCode, Value) {
    let response = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
    let status = response.status();
    let body = response.json().await.unwrap();
    (status, body)
}

#[tokio::test]
async fn status_is_a_direct_payload_without_envelope() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = spawn_test_api(&stack).await;

    let (status, body) = get_json(addr, "/api/status").await;
    assert_eq!(status, 200);
    assert!(body.get("success").is_none());
    assert_eq!(body["status"], "online");
    assert_eq!(body["connections"], 0);
    assert!(body["uptime"].is_string());
}

#[tokio::test]
async fn recent_mining_returns_persisted_rows_newest_first() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = spawn_test_api(&stack).await;

    for material in ["Painite", "Platinum", "Osmium"] {
        stack
            .envelope_tx
            .send(mining_envelope("Borann", "A 2", material))
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    stack.storage.flush().await.unwrap();

    let (status, body) = get_json(addr, "/api/mining/recent?limit=2").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);

    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["materialRefined"], "Osmium");
}

#[tokio::test]
async fn commodities_recent_reflects_ingested_market_data() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = spawn_test_api(&stack).await;

    stack
        .envelope_tx
        .send(commodity_envelope("Ray Gateway", "Diaguandri", &["Gold"]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    stack.storage.flush().await.unwrap();

    let (_, body) = get_json(addr, "/api/commodities/recent").await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"][0]["commodityName"], "Gold");
    assert_eq!(body["data"][0]["systemName"], "Diaguandri");
}

#[tokio::test]
async fn mining_sites_round_trip() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = spawn_test_api(&stack).await;

    stack
        .storage
        .insert_sites(vec![MiningSiteRow {
            system_name: "Borann".to_string(),
            body_name: Some("A 2".to_string()),
            site_type: SiteType::Hotspot,
            material_type: Some(MaterialType::PristineMetallic),
            hotspot_materials: vec!["Painite".to_string()],
            coordinates: [-25.3, 16.1, 45.9],
            source: "seed".to_string(),
        }])
        .await
        .unwrap();

    let (status, body) = get_json(addr, "/api/mining/sites").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"][0]["siteType"], "hotspot");
    assert_eq!(body["data"][0]["materialType"], "pristine_metallic");
}

#[tokio::test]
async fn metrics_rejects_invalid_time_range() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = spawn_test_api(&stack).await;

    let (status, body) = get_json(addr, "/api/metrics?timeRange=yesterday").await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);

    let (status, body) = get_json(addr, "/api/metrics?timeRange=15m").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert!(body["data"]["history"].is_array());
}

#[tokio::test]
async fn errors_endpoint_filters_by_severity() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = spawn_test_api(&stack).await;

    stack
        .monitor
        .track_error("relay", "fatal handshake error", "ws")
        .await
        .unwrap();
    stack
        .monitor
        .track_error("api", "odd request", "http")
        .await
        .unwrap();

    let (_, body) = get_json(addr, "/api/monitoring/errors?severity=critical").await;
    assert_eq!(body["data"]["summary"]["totalErrors"], 1);

    let (status, body) = get_json(addr, "/api/monitoring/errors?severity=catastrophic").await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn sources_reports_per_source_estimates() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = spawn_test_api(&stack).await;

    stack
        .envelope_tx
        .send(mining_envelope("Borann", "A 2", "Painite"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, body) = get_json(addr, "/api/sources").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["totalProcessed"], 1);
    assert_eq!(body["data"]["sources"][0]["source"], "eddn");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = spawn_test_api(&stack).await;

    let response = reqwest::get(format!("http://{addr}/api/nope")).await.unwrap();
    assert_eq!(response.status(), 404);
}
