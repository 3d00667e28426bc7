pub mod actors;
pub mod api;
pub mod classifier;
pub mod config;
pub mod monitoring;
pub mod relay;
pub mod storage;
pub mod util;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope delivered by the upstream relay.
///
/// The relay publishes every message wrapped in `{ "$schemaRef": ..., "message": ... }`.
/// Envelopes are ephemeral: the classifier consumes each one exactly once and
/// never persists it as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEnvelope {
    #[serde(rename = "$schemaRef")]
    pub schema_ref: String,
    pub message: serde_json::Value,
}

/// A single commodity market entry extracted from a "commodity" relay message.
///
/// Append-only once persisted. All numeric fields are non-negative by
/// construction (unsigned types).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    pub commodity_name: String,
    pub station_name: String,
    pub system_name: String,
    pub buy_price: u64,
    pub sell_price: u64,
    pub supply: u64,
    pub demand: u64,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// A refinement event extracted from a "journal" relay message.
///
/// Commander identity is intentionally absent: the relay anonymizes its feed
/// and this system must never synthesize one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningEventRecord {
    pub system_name: String,
    pub body_name: String,
    pub material_refined: String,
    pub amount: u64,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// One throughput sample computed by the metrics sampler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSample {
    /// Records per second over the last sampling interval. Clamped to zero on
    /// counter resets or clock anomalies, never negative.
    pub data_processing_rate: u64,
    /// Monotonic counter of records emitted since startup.
    pub total_processed: u64,
    pub sampled_at: DateTime<Utc>,
}
