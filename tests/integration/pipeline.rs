//! End-to-end ingestion pipeline tests: envelope in, persisted rows and
//! subscriber frames out.

use std::time::Duration;

use eddn_hub::actors::messages::{CHANNEL_COMMODITIES, CHANNEL_MINING, ConnectionMessage, Frame};
use tokio::sync::mpsc;

use crate::helpers::{commodity_envelope, mining_envelope, spawn_stack};

fn collect_frames(rx: &mut mpsc::UnboundedReceiver<ConnectionMessage>) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let ConnectionMessage::Text(text) = msg {
            frames.push(serde_json::from_str(&text).unwrap());
        }
    }
    frames
}

#[tokio::test]
async fn commodity_envelope_fans_out_to_storage_and_subscribers() {
    let stack = spawn_stack(Duration::from_secs(60), None);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = stack.hub.register(tx).await.unwrap();
    assert!(stack.hub.subscribe(id, CHANNEL_COMMODITIES).await);

    stack
        .envelope_tx
        .send(commodity_envelope("Ray Gateway", "Diaguandri", &["Gold", "Painite"]))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    stack.storage.flush().await.unwrap();

    // One message fanned out to two persisted rows
    let rows = stack.storage.recent_commodities(10).await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.station_name == "Ray Gateway"));

    // And two frames to the subscriber (after the welcome/subscribed ones)
    let frames = collect_frames(&mut rx);
    let market_frames: Vec<_> = frames.iter().filter(|f| f.kind == "marketData").collect();
    assert_eq!(market_frames.len(), 2);
}

#[tokio::test]
async fn mining_event_is_anonymized_before_broadcast() {
    let stack = spawn_stack(Duration::from_secs(60), None);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = stack.hub.register(tx).await.unwrap();
    stack.hub.subscribe(id, CHANNEL_MINING).await;

    stack
        .envelope_tx
        .send(mining_envelope("Borann", "A 2", "Painite"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let frames = collect_frames(&mut rx);
    let mining = frames
        .iter()
        .find(|f| f.kind == "miningData")
        .expect("mining frame delivered");

    assert_eq!(mining.payload["materialRefined"], "Painite");
    // Commander identity from the relay never reaches subscribers
    let raw = serde_json::to_string(&mining.payload).unwrap();
    assert!(!raw.contains("commanderName"));
    assert!(!raw.contains("CMDR"));
}

#[tokio::test]
async fn unmatched_schema_is_dropped_silently() {
    let stack = spawn_stack(Duration::from_secs(60), None);

    stack
        .envelope_tx
        .send(eddn_hub::RelayEnvelope {
            schema_ref: "https://eddn.edcd.io/schemas/shipyard/2".to_string(),
            message: serde_json::json!({ "ships": ["sidewinder"] }),
        })
        .await
        .unwrap();
    stack
        .envelope_tx
        .send(mining_envelope("Borann", "A 2", "Platinum"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    stack.storage.flush().await.unwrap();

    // Pipeline keeps going; only the recognized message produced a row
    let rows = stack.storage.recent_mining_events(10).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].material_refined, "Platinum");

    // Dropped schemas are not tracked as errors
    let report = stack
        .monitor
        .errors
        .query(chrono::Utc::now() - chrono::Duration::minutes(1), None)
        .await
        .unwrap();
    assert_eq!(report.summary.total_errors, 0);
}

#[tokio::test]
async fn broadcast_continues_when_storage_is_down() {
    let stack = spawn_stack(Duration::from_secs(60), None);

    stack.storage.shutdown().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = stack.hub.register(tx).await.unwrap();
    stack.hub.subscribe(id, CHANNEL_MINING).await;

    stack
        .envelope_tx
        .send(mining_envelope("Delkar", "7 A Ring", "Painite"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Persistence loss does not block the broadcast sink
    let frames = collect_frames(&mut rx);
    assert!(frames.iter().any(|f| f.kind == "miningData"));
}

#[tokio::test]
async fn sampler_counts_classified_records() {
    let stack = spawn_stack(Duration::from_secs(60), None);

    for _ in 0..3 {
        stack
            .envelope_tx
            .send(mining_envelope("Borann", "A 2", "Painite"))
            .await
            .unwrap();
    }

    // Wait past one 200ms sampling tick
    tokio::time::sleep(Duration::from_millis(300)).await;

    let sample = stack.sampler.current_sample().await.unwrap();
    assert_eq!(sample.total_processed, 3);
}
