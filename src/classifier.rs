//! Ingestion classifier - turns relay envelopes into typed records
//!
//! Classification is a substring match on the envelope's schema reference:
//! "commodity" messages fan out to one [`MarketRecord`] per commodity entry,
//! "journal" messages emit a [`MiningEventRecord`] for `MiningRefined` events
//! only. Everything else is dropped with a trace log; the relay schema space
//! is large and only a small subset is relevant here.
//!
//! Each emitted record is published twice: once on the record broadcast
//! channel (persisted by the storage actor, counted by the sampler) and once
//! through the hub to live subscribers. The two sinks are independent; a
//! failure in one never blocks the other, and nothing classified here can
//! fail the ingestion loop.

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace};

use crate::actors::hub::HubHandle;
use crate::actors::messages::{Frame, RecordEvent};
use crate::{MarketRecord, MiningEventRecord, RelayEnvelope};

/// Source tag stamped on every record produced from the relay feed.
const SOURCE_EDDN: &str = "eddn";

/// Classify one relay envelope into zero or more records.
///
/// Pure and infallible: malformed or unrecognized messages yield an empty
/// vector and are not counted as errors.
pub fn classify(envelope: &RelayEnvelope) -> Vec<RecordEvent> {
    if envelope.schema_ref.contains("commodity") {
        classify_commodity(&envelope.message)
    } else if envelope.schema_ref.contains("journal") {
        classify_journal(&envelope.message)
    } else {
        trace!("unmatched schema {:?}, dropping", envelope.schema_ref);
        Vec::new()
    }
}

fn classify_commodity(message: &Value) -> Vec<RecordEvent> {
    let (Some(station_name), Some(system_name)) = (
        message.get("stationName").and_then(Value::as_str),
        message.get("systemName").and_then(Value::as_str),
    ) else {
        trace!("commodity message without station/system, dropping");
        return Vec::new();
    };

    let Some(commodities) = message.get("commodities").and_then(Value::as_array) else {
        return Vec::new();
    };

    let timestamp = chrono::Utc::now();

    commodities
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name").and_then(Value::as_str)?;

            Some(RecordEvent::Market(MarketRecord {
                commodity_name: name.to_string(),
                station_name: station_name.to_string(),
                system_name: system_name.to_string(),
                buy_price: non_negative(entry.get("buyPrice")),
                sell_price: non_negative(entry.get("sellPrice")),
                supply: non_negative(entry.get("stock")),
                demand: non_negative(entry.get("demand")),
                source: SOURCE_EDDN.to_string(),
                timestamp,
            }))
        })
        .collect()
}

fn classify_journal(message: &Value) -> Vec<RecordEvent> {
    let event = message.get("event").and_then(Value::as_str);
    if event != Some("MiningRefined") {
        return Vec::new();
    }

    let system_name = message
        .get("StarSystem")
        .and_then(Value::as_str)
        .unwrap_or("Unknown");
    let body_name = message
        .get("Body")
        .and_then(Value::as_str)
        .unwrap_or("Unknown");
    let Some(material) = message.get("Type").and_then(Value::as_str) else {
        trace!("MiningRefined event without material type, dropping");
        return Vec::new();
    };

    vec![RecordEvent::Mining(MiningEventRecord {
        system_name: system_name.to_string(),
        body_name: body_name.to_string(),
        material_refined: material.to_string(),
        // The relay reports refinements one ton at a time
        amount: 1,
        source: SOURCE_EDDN.to_string(),
        timestamp: chrono::Utc::now(),
    })]
}

/// Extract a numeric field, clamping negatives and garbage to zero.
fn non_negative(value: Option<&Value>) -> u64 {
    value
        .and_then(Value::as_i64)
        .map(|v| v.max(0) as u64)
        .unwrap_or(0)
}

/// Spawn the classifier loop.
///
/// Consumes envelopes in relay delivery order (no reordering) until the
/// relay side closes the channel.
pub fn spawn(
    mut relay_rx: mpsc::Receiver<RelayEnvelope>,
    record_tx: broadcast::Sender<RecordEvent>,
    hub: HubHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run(&mut relay_rx, &record_tx, &hub).await;
    })
}

#[instrument(skip_all)]
async fn run(
    relay_rx: &mut mpsc::Receiver<RelayEnvelope>,
    record_tx: &broadcast::Sender<RecordEvent>,
    hub: &HubHandle,
) {
    debug!("starting ingestion classifier");

    while let Some(envelope) = relay_rx.recv().await {
        for record in classify(&envelope) {
            let frame = Frame::new(record.frame_type(), record.payload());
            let channel = record.channel().to_string();

            // No receivers is fine; storage and sampler may not be up yet.
            let _ = record_tx.send(record);

            hub.broadcast(frame, Some(channel)).await;
        }
    }

    debug!("relay channel closed, classifier stopped");
}
