//! Helper functions for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use eddn_hub::RelayEnvelope;
use eddn_hub::actors::hub::HubHandle;
use eddn_hub::actors::messages::RecordEvent;
use eddn_hub::actors::sampler::SamplerHandle;
use eddn_hub::actors::storage::StorageHandle;
use eddn_hub::api::{ApiState, spawn_api_server};
use eddn_hub::classifier;
use eddn_hub::config::ApiSettings;
use eddn_hub::monitoring::MonitorAggregator;
use eddn_hub::monitoring::alerts::AlertingHandle;
use eddn_hub::monitoring::errors::ErrorTrackerHandle;
use eddn_hub::monitoring::performance::PerformanceHandle;
use eddn_hub::storage::memory::MemoryBackend;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};

/// A fully wired system on an in-memory backend.
pub struct TestStack {
    pub hub: HubHandle,
    pub storage: StorageHandle,
    pub sampler: SamplerHandle,
    pub monitor: MonitorAggregator,
    pub record_tx: broadcast::Sender<RecordEvent>,
    pub envelope_tx: mpsc::Sender<RelayEnvelope>,
}

pub fn spawn_stack(heartbeat: Duration, webhook_url: Option<String>) -> TestStack {
    let hub = HubHandle::spawn(heartbeat);
    let errors = ErrorTrackerHandle::spawn();

    let (record_tx, _) = broadcast::channel(256);

    let storage = StorageHandle::spawn(
        Box::new(MemoryBackend::new()),
        record_tx.subscribe(),
        errors.clone(),
    );
    let sampler = SamplerHandle::spawn(
        Duration::from_millis(200),
        record_tx.subscribe(),
        hub.clone(),
    );
    let performance = PerformanceHandle::spawn();
    let alerting = AlertingHandle::spawn(webhook_url, hub.clone());

    let monitor = MonitorAggregator::new(
        hub.clone(),
        storage.clone(),
        sampler.clone(),
        errors,
        performance,
        alerting,
        vec!["log".to_string()],
        25.0,
    );

    let (envelope_tx, envelope_rx) = mpsc::channel(64);
    classifier::spawn(envelope_rx, record_tx.clone(), hub.clone());

    TestStack {
        hub,
        storage,
        sampler,
        monitor,
        record_tx,
        envelope_tx,
    }
}

/// Spawn the API server for the stack on a random port.
pub async fn spawn_test_api(stack: &TestStack) -> SocketAddr {
    let state = ApiState::new(
        stack.hub.clone(),
        stack.storage.clone(),
        stack.sampler.clone(),
        stack.monitor.clone(),
    );

    let settings = ApiSettings {
        bind: "127.0.0.1:0".parse().unwrap(),
        enable_cors: true,
    };

    spawn_api_server(&settings, state).await.unwrap()
}

pub fn commodity_envelope(station: &str, system: &str, names: &[&str]) -> RelayEnvelope {
    let commodities: Vec<serde_json::Value> = names
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "buyPrice": 120,
                "sellPrice": 140,
                "stock": 800,
                "demand": 400,
            })
        })
        .collect();

    RelayEnvelope {
        schema_ref: "https://eddn.edcd.io/schemas/commodity/3".to_string(),
        message: json!({
            "stationName": station,
            "systemName": system,
            "commodities": commodities,
        }),
    }
}

pub fn mining_envelope(system: &str, body: &str, material: &str) -> RelayEnvelope {
    RelayEnvelope {
        schema_ref: "https://eddn.edcd.io/schemas/journal/1".to_string(),
        message: json!({
            "event": "MiningRefined",
            "StarSystem": system,
            "Body": body,
            "Type": material,
            "commanderName": "CMDR Test",
        }),
    }
}
