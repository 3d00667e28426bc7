//! Message types for actor communication
//!
//! 1. **Commands**: Request/response messages sent to specific actors via mpsc
//! 2. **Events**: Broadcast notifications published to multiple subscribers
//! 3. **Frames**: JSON payloads exchanged with WebSocket subscribers
//!
//! All events are cloneable so the broadcast channel can fan them out to the
//! storage actor and the metrics sampler independently.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::{MarketRecord, MetricsSample, MiningEventRecord};
use crate::storage::schema::{CommodityPriceRow, MiningEventRow, MiningSiteRow};

/// Channel carrying commodity market updates to subscribers.
pub const CHANNEL_COMMODITIES: &str = "commodities";
/// Channel carrying mining refinement events to subscribers.
pub const CHANNEL_MINING: &str = "mining";
/// Channel carrying throughput samples to subscribers.
pub const CHANNEL_METRICS: &str = "metrics";
/// Channel carrying triggered alerts to subscribers.
pub const CHANNEL_ALERTS: &str = "alerts";

/// A classified record emitted by the ingestion classifier.
///
/// Published once per record to the record broadcast channel. The storage
/// actor and the metrics sampler consume it independently; a failure in one
/// never blocks the other.
#[derive(Debug, Clone)]
pub enum RecordEvent {
    Market(MarketRecord),
    Mining(MiningEventRecord),
}

impl RecordEvent {
    /// Hub channel this record is broadcast on.
    pub fn channel(&self) -> &'static str {
        match self {
            RecordEvent::Market(_) => CHANNEL_COMMODITIES,
            RecordEvent::Mining(_) => CHANNEL_MINING,
        }
    }

    /// Frame type announced to WebSocket subscribers.
    pub fn frame_type(&self) -> &'static str {
        match self {
            RecordEvent::Market(_) => "marketData",
            RecordEvent::Mining(_) => "miningData",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            RecordEvent::Market(record) => serde_json::json!(record),
            RecordEvent::Mining(record) => serde_json::json!(record),
        }
    }
}

/// Outbound frame sent to WebSocket subscribers.
///
/// Wire shape: `{ "type": string, "payload": object, "timestamp": ISO8601 }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
    pub timestamp: String,
}

impl Frame {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Control frame received from a WebSocket subscriber.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    Subscribe { channel: Option<String> },
    Unsubscribe { channel: Option<String> },
    Ping,
}

/// Message delivered from the hub to one connection's transport writer.
#[derive(Debug, Clone)]
pub enum ConnectionMessage {
    /// Pre-serialized JSON frame
    Text(String),
    /// Transport-level ping; the transport answers with a pong that feeds
    /// back into the hub's liveness state
    Ping,
    /// Hub-initiated termination (liveness eviction or shutdown)
    Close,
}

/// Opaque connection identity handed out by the hub.
pub type ConnectionId = u64;

/// Commands that can be sent to the SubscriptionHub
#[derive(Debug)]
pub enum HubCommand {
    /// Register a new connection and receive its id
    Register {
        sender: mpsc::UnboundedSender<ConnectionMessage>,
        respond_to: oneshot::Sender<ConnectionId>,
    },

    /// Add a channel to a connection's subscription set.
    ///
    /// Responds `false` for an unknown connection. That is a no-op failure
    /// reported to the caller only, never fatal to the hub.
    Subscribe {
        id: ConnectionId,
        channel: String,
        respond_to: oneshot::Sender<bool>,
    },

    /// Remove a channel from a connection's subscription set
    Unsubscribe {
        id: ConnectionId,
        channel: String,
        respond_to: oneshot::Sender<bool>,
    },

    /// A pong arrived on a connection's transport
    Pong { id: ConnectionId },

    /// Broadcast a frame to subscribers.
    ///
    /// With a channel, only connections subscribed to it receive the frame;
    /// without one, all live connections do.
    Broadcast {
        frame: Frame,
        channel: Option<String>,
    },

    /// Deregister a connection (transport closed)
    Disconnect { id: ConnectionId },

    /// Number of registered connections
    ConnectionCount { respond_to: oneshot::Sender<usize> },

    /// Gracefully shut down the hub, closing all connections
    Shutdown,
}

/// Commands that can be sent to the StorageActor
#[derive(Debug)]
pub enum StorageCommand {
    /// Flush write buffers to the backend immediately
    Flush {
        respond_to: oneshot::Sender<anyhow::Result<()>>,
    },

    /// Most recent mining events, newest first
    RecentMiningEvents {
        limit: usize,
        respond_to: oneshot::Sender<Vec<MiningEventRow>>,
    },

    /// Most recent commodity prices, newest first
    RecentCommodities {
        limit: usize,
        respond_to: oneshot::Sender<Vec<CommodityPriceRow>>,
    },

    /// All known mining sites
    ListSites {
        respond_to: oneshot::Sender<Vec<MiningSiteRow>>,
    },

    /// Seed mining sites into the backend
    InsertSites {
        sites: Vec<MiningSiteRow>,
        respond_to: oneshot::Sender<anyhow::Result<()>>,
    },

    /// Backend reachability and connection count
    HealthCheck {
        respond_to: oneshot::Sender<anyhow::Result<StorageHealth>>,
    },

    /// Storage statistics
    GetStats {
        respond_to: oneshot::Sender<StorageStats>,
    },

    /// Gracefully shut down the storage actor
    Shutdown,
}

/// Health snapshot of the persistence backend.
#[derive(Debug, Clone)]
pub struct StorageHealth {
    pub healthy: bool,
    pub message: String,
    /// Open backend connections; zero means the persistence layer is gone
    pub connections: usize,
}

/// Storage statistics
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    /// Rows currently waiting in write buffers
    pub buffer_size: usize,
    /// Number of flush operations performed
    pub flush_count: u64,
    /// Rows dropped because a flush failed
    pub dropped_rows: u64,
}

/// Commands that can be sent to the MetricsSampler
#[derive(Debug)]
pub enum SamplerCommand {
    /// The most recent sample
    CurrentSample {
        respond_to: oneshot::Sender<MetricsSample>,
    },

    /// Samples recorded since the given instant, oldest first
    History {
        since: chrono::DateTime<chrono::Utc>,
        respond_to: oneshot::Sender<Vec<MetricsSample>>,
    },

    /// Per-source throughput estimates for the sources dashboard
    SourceEstimates {
        respond_to: oneshot::Sender<Value>,
    },

    /// Gracefully shut down the sampler
    Shutdown,
}
