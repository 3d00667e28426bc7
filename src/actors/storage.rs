//! StorageActor - persists classified records through a pluggable backend
//!
//! Subscribes to the record broadcast channel, buffers rows per collection
//! and flushes in batches. Two independent flush triggers:
//!
//! - **Size trigger**: flush after 100 buffered rows
//! - **Time trigger**: flush after 5 seconds
//!
//! A flush failure drops that batch, reports a Persistence error through
//! error tracking and keeps the actor alive. Broadcast and ingestion are
//! never blocked by persistence problems.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time;
use tracing::{debug, instrument, trace, warn};

use crate::monitoring::errors::ErrorTrackerHandle;
use crate::storage::StorageBackend;
use crate::storage::schema::{CommodityPriceRow, MiningEventRow, MiningSiteRow};

use super::messages::{RecordEvent, StorageCommand, StorageHealth, StorageStats};

/// Batch size trigger - flush after this many buffered rows
const BATCH_SIZE_TRIGGER: usize = 100;

/// Batch time trigger - flush after this duration
const BATCH_TIME_TRIGGER: Duration = Duration::from_secs(5);

/// Storage actor with a pluggable backend
pub struct StorageActor {
    backend: Box<dyn StorageBackend>,

    commodity_buffer: Vec<CommodityPriceRow>,
    mining_buffer: Vec<MiningEventRow>,

    command_rx: mpsc::Receiver<StorageCommand>,
    record_rx: broadcast::Receiver<RecordEvent>,

    errors: ErrorTrackerHandle,

    flush_count: u64,
    dropped_rows: u64,
}

impl StorageActor {
    pub fn new(
        backend: Box<dyn StorageBackend>,
        command_rx: mpsc::Receiver<StorageCommand>,
        record_rx: broadcast::Receiver<RecordEvent>,
        errors: ErrorTrackerHandle,
    ) -> Self {
        Self {
            backend,
            commodity_buffer: Vec::with_capacity(BATCH_SIZE_TRIGGER),
            mining_buffer: Vec::with_capacity(BATCH_SIZE_TRIGGER),
            command_rx,
            record_rx,
            errors,
            flush_count: 0,
            dropped_rows: 0,
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting storage actor");

        let mut flush_interval = time::interval(BATCH_TIME_TRIGGER);

        loop {
            tokio::select! {
                result = self.record_rx.recv() => {
                    match result {
                        Ok(event) => {
                            self.buffer_record(event);
                            if self.buffer_size() >= BATCH_SIZE_TRIGGER {
                                trace!("size-based flush triggered");
                                self.flush().await;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("storage actor lagged, skipped {skipped} records");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("record channel closed, shutting down");
                            break;
                        }
                    }
                }

                _ = flush_interval.tick() => {
                    if self.buffer_size() > 0 {
                        trace!("time-based flush triggered ({} rows)", self.buffer_size());
                        self.flush().await;
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        // Final flush so a graceful shutdown does not lose buffered rows
        self.flush().await;
        if let Err(e) = self.backend.close().await {
            warn!("failed to close storage backend: {e}");
        }

        debug!("storage actor stopped");
    }

    fn buffer_record(&mut self, event: RecordEvent) {
        match event {
            RecordEvent::Market(record) => {
                self.commodity_buffer.push(CommodityPriceRow::from(&record));
            }
            RecordEvent::Mining(record) => {
                self.mining_buffer.push(MiningEventRow::from(&record));
            }
        }
    }

    fn buffer_size(&self) -> usize {
        self.commodity_buffer.len() + self.mining_buffer.len()
    }

    /// Flush both buffers. Each collection flushes independently; a failure
    /// in one does not prevent the other from persisting.
    async fn flush(&mut self) {
        if !self.commodity_buffer.is_empty() {
            let batch = std::mem::take(&mut self.commodity_buffer);
            let count = batch.len();

            if let Err(e) = self.backend.insert_commodities(batch).await {
                warn!("failed to persist {count} commodity rows: {e}");
                self.dropped_rows += count as u64;
                self.errors.track_nowait(
                    "persistence",
                    &format!("commodity batch insert failed: {e}"),
                    "storage flush",
                );
            } else {
                self.flush_count += 1;
            }
        }

        if !self.mining_buffer.is_empty() {
            let batch = std::mem::take(&mut self.mining_buffer);
            let count = batch.len();

            if let Err(e) = self.backend.insert_mining_events(batch).await {
                warn!("failed to persist {count} mining event rows: {e}");
                self.dropped_rows += count as u64;
                self.errors.track_nowait(
                    "persistence",
                    &format!("mining event batch insert failed: {e}"),
                    "storage flush",
                );
            } else {
                self.flush_count += 1;
            }
        }
    }

    /// Returns `false` when the actor should stop.
    async fn handle_command(&mut self, cmd: StorageCommand) -> bool {
        match cmd {
            StorageCommand::Flush { respond_to } => {
                self.flush().await;
                let _ = respond_to.send(Ok(()));
            }

            StorageCommand::RecentMiningEvents { limit, respond_to } => {
                let rows = match self.backend.recent_mining_events(limit).await {
                    Ok(rows) => rows,
                    Err(e) => {
                        self.errors.track_nowait(
                            "persistence",
                            &format!("mining event query failed: {e}"),
                            "storage query",
                        );
                        Vec::new()
                    }
                };
                let _ = respond_to.send(rows);
            }

            StorageCommand::RecentCommodities { limit, respond_to } => {
                let rows = match self.backend.recent_commodities(limit).await {
                    Ok(rows) => rows,
                    Err(e) => {
                        self.errors.track_nowait(
                            "persistence",
                            &format!("commodity query failed: {e}"),
                            "storage query",
                        );
                        Vec::new()
                    }
                };
                let _ = respond_to.send(rows);
            }

            StorageCommand::ListSites { respond_to } => {
                let sites = match self.backend.list_sites().await {
                    Ok(sites) => sites,
                    Err(e) => {
                        self.errors.track_nowait(
                            "persistence",
                            &format!("site query failed: {e}"),
                            "storage query",
                        );
                        Vec::new()
                    }
                };
                let _ = respond_to.send(sites);
            }

            StorageCommand::InsertSites { sites, respond_to } => {
                let result = self
                    .backend
                    .insert_sites(sites)
                    .await
                    .map_err(|e| anyhow::anyhow!(e.to_string()));
                let _ = respond_to.send(result);
            }

            StorageCommand::HealthCheck { respond_to } => {
                let result = self
                    .backend
                    .health_check()
                    .await
                    .map(|health| StorageHealth {
                        healthy: health.healthy,
                        message: health.message,
                        connections: health.connections,
                    })
                    .map_err(|e| anyhow::anyhow!(e.to_string()));
                let _ = respond_to.send(result);
            }

            StorageCommand::GetStats { respond_to } => {
                let _ = respond_to.send(StorageStats {
                    buffer_size: self.buffer_size(),
                    flush_count: self.flush_count,
                    dropped_rows: self.dropped_rows,
                });
            }

            StorageCommand::Shutdown => {
                debug!("received shutdown command");
                return false;
            }
        }

        true
    }
}

/// Handle for interacting with the StorageActor
#[derive(Debug, Clone)]
pub struct StorageHandle {
    sender: mpsc::Sender<StorageCommand>,
}

impl StorageHandle {
    /// Spawn a storage actor over the given backend.
    pub fn spawn(
        backend: Box<dyn StorageBackend>,
        record_rx: broadcast::Receiver<RecordEvent>,
        errors: ErrorTrackerHandle,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        let actor = StorageActor::new(backend, cmd_rx, record_rx, errors);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Flush write buffers immediately.
    pub async fn flush(&self) -> anyhow::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(StorageCommand::Flush { respond_to: tx })
            .await
            .map_err(|_| anyhow::anyhow!("storage actor unavailable"))?;
        rx.await
            .map_err(|_| anyhow::anyhow!("storage actor dropped request"))?
    }

    /// Most recent mining events, newest first. Empty on query failure.
    pub async fn recent_mining_events(&self, limit: usize) -> Vec<MiningEventRow> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(StorageCommand::RecentMiningEvents {
                limit,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Most recent commodity prices, newest first. Empty on query failure.
    pub async fn recent_commodities(&self, limit: usize) -> Vec<CommodityPriceRow> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(StorageCommand::RecentCommodities {
                limit,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// All known mining sites.
    pub async fn list_sites(&self) -> Vec<MiningSiteRow> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(StorageCommand::ListSites { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Seed mining site reference rows.
    pub async fn insert_sites(&self, sites: Vec<MiningSiteRow>) -> anyhow::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(StorageCommand::InsertSites {
                sites,
                respond_to: tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("storage actor unavailable"))?;
        rx.await
            .map_err(|_| anyhow::anyhow!("storage actor dropped request"))?
    }

    /// Backend reachability and connection count.
    pub async fn health_check(&self) -> anyhow::Result<StorageHealth> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(StorageCommand::HealthCheck { respond_to: tx })
            .await
            .map_err(|_| anyhow::anyhow!("storage actor unavailable"))?;
        rx.await
            .map_err(|_| anyhow::anyhow!("storage actor dropped request"))?
    }

    /// Storage statistics.
    pub async fn stats(&self) -> Option<StorageStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(StorageCommand::GetStats { respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Shutdown the storage actor
    pub async fn shutdown(&self) {
        let _ = self.sender.send(StorageCommand::Shutdown).await;
    }
}
