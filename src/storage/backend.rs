//! Storage backend trait definition

use async_trait::async_trait;

use super::error::StorageResult;
use super::schema::{CommodityPriceRow, MiningEventRow, MiningSiteRow};

/// Health snapshot reported by a backend.
#[derive(Debug, Clone)]
pub struct BackendHealth {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Open connections to the backend. Zero means the persistence layer
    /// is effectively gone and the system should report unhealthy.
    pub connections: usize,
}

/// Trait for persistent storage backends
///
/// All backends (SQLite, in-memory, future engines) implement this trait:
///
/// - **Async**: all methods are async for compatibility with Tokio
/// - **Batch-oriented**: inserts take batches, the storage actor buffers
/// - **Append-only**: ingested rows are never updated after insertion;
///   duplicate relay deliveries may produce duplicate rows
///
/// Implementations must be `Send + Sync` as they are used across tasks.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Insert a batch of commodity price rows
    async fn insert_commodities(&self, rows: Vec<CommodityPriceRow>) -> StorageResult<()>;

    /// Insert a batch of mining event rows
    async fn insert_mining_events(&self, rows: Vec<MiningEventRow>) -> StorageResult<()>;

    /// Seed mining site reference rows
    async fn insert_sites(&self, rows: Vec<MiningSiteRow>) -> StorageResult<()>;

    /// The N most recent commodity prices, newest first
    async fn recent_commodities(&self, limit: usize) -> StorageResult<Vec<CommodityPriceRow>>;

    /// The N most recent mining events, newest first
    async fn recent_mining_events(&self, limit: usize) -> StorageResult<Vec<MiningEventRow>>;

    /// All known mining sites
    async fn list_sites(&self) -> StorageResult<Vec<MiningSiteRow>>;

    /// Check backend reachability with a lightweight operation
    async fn health_check(&self) -> StorageResult<BackendHealth>;

    /// Human-readable backend statistics
    async fn stats(&self) -> StorageResult<String>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
