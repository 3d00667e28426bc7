//! In-memory storage backend (no persistence)
//!
//! Ring buffers with a fixed capacity per collection. Useful for tests and
//! for running without a database; all data is lost on restart.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::backend::{BackendHealth, StorageBackend};
use super::error::StorageResult;
use super::schema::{CommodityPriceRow, MiningEventRow, MiningSiteRow};

/// Maximum rows kept per ingested collection
const MAX_ROWS: usize = 1000;

#[derive(Default)]
struct Collections {
    commodities: VecDeque<CommodityPriceRow>,
    mining_events: VecDeque<MiningEventRow>,
    sites: Vec<MiningSiteRow>,
}

/// In-memory storage backend
pub struct MemoryBackend {
    collections: RwLock<Collections>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(Collections::default()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, rows: Vec<T>) {
    for row in rows {
        if buffer.len() == MAX_ROWS {
            buffer.pop_front();
        }
        buffer.push_back(row);
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn insert_commodities(&self, rows: Vec<CommodityPriceRow>) -> StorageResult<()> {
        let mut collections = self.collections.write().await;
        push_bounded(&mut collections.commodities, rows);
        Ok(())
    }

    async fn insert_mining_events(&self, rows: Vec<MiningEventRow>) -> StorageResult<()> {
        let mut collections = self.collections.write().await;
        push_bounded(&mut collections.mining_events, rows);
        Ok(())
    }

    async fn insert_sites(&self, rows: Vec<MiningSiteRow>) -> StorageResult<()> {
        let mut collections = self.collections.write().await;
        collections.sites.extend(rows);
        Ok(())
    }

    async fn recent_commodities(&self, limit: usize) -> StorageResult<Vec<CommodityPriceRow>> {
        let collections = self.collections.read().await;
        Ok(collections
            .commodities
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent_mining_events(&self, limit: usize) -> StorageResult<Vec<MiningEventRow>> {
        let collections = self.collections.read().await;
        Ok(collections
            .mining_events
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_sites(&self) -> StorageResult<Vec<MiningSiteRow>> {
        let collections = self.collections.read().await;
        Ok(collections.sites.clone())
    }

    async fn health_check(&self) -> StorageResult<BackendHealth> {
        let collections = self.collections.read().await;
        Ok(BackendHealth {
            healthy: true,
            message: format!(
                "in-memory storage operational ({} commodities, {} mining events)",
                collections.commodities.len(),
                collections.mining_events.len()
            ),
            connections: 1,
        })
    }

    async fn stats(&self) -> StorageResult<String> {
        let collections = self.collections.read().await;
        Ok(format!(
            "In-Memory: {} commodity prices, {} mining events, {} sites",
            collections.commodities.len(),
            collections.mining_events.len(),
            collections.sites.len()
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
