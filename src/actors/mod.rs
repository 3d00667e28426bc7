//! Actor-based ingestion and fan-out pipeline
//!
//! Each long-lived component runs as an independent async task communicating
//! via Tokio channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!   RelayClient ──mpsc──► IngestionClassifier
//!                              │
//!                ┌─────────────┼──────────────────┐
//!                │ broadcast<RecordEvent>         │ HubHandle
//!                ▼             ▼                  ▼
//!          StorageActor   MetricsSampler   SubscriptionHub ──► WS clients
//! ```
//!
//! ## Actor Types
//!
//! - **SubscriptionHub**: owns the connection registry, performs
//!   channel-filtered broadcast and the heartbeat liveness sweep
//! - **StorageActor**: batches classified records and persists them through
//!   a pluggable backend
//! - **MetricsSampler**: counts emitted records and computes throughput
//!   samples on a fixed interval
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has an mpsc command channel for control
//! 2. **Events**: classified records go out on a broadcast channel so the
//!    storage and sampler consumers stay independent of each other
//! 3. **Request/Response**: oneshot channels for synchronous queries

pub mod hub;
pub mod messages;
pub mod sampler;
pub mod storage;
