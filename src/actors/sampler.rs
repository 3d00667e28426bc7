//! MetricsSampler - periodic throughput sampling over the record stream
//!
//! Counts every classified record from the broadcast channel and, on a fixed
//! interval, turns the counter delta into a records-per-second rate. Each
//! sample is retained in a bounded history and pushed to WebSocket
//! subscribers of the metrics channel.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, instrument, trace, warn};

use crate::MetricsSample;

use super::hub::HubHandle;
use super::messages::{CHANNEL_METRICS, Frame, RecordEvent, SamplerCommand};

/// Samples retained in history (24h at the default 10s interval)
const MAX_HISTORY: usize = 8640;

/// Rate over an interval from two counter readings.
///
/// Clamps to zero when the counter moved backwards (process restart observed
/// through shared state) or the elapsed time is not positive. Never negative.
pub fn compute_rate(previous_total: u64, current_total: u64, elapsed_secs: f64) -> u64 {
    if current_total < previous_total || elapsed_secs <= 0.0 {
        return 0;
    }
    let delta = (current_total - previous_total) as f64;
    (delta / elapsed_secs).round() as u64
}

/// Metrics sampling actor
pub struct MetricsSampler {
    interval: Duration,

    total_processed: u64,
    last_total: u64,
    last_tick: Instant,
    /// Records counted per source identifier, for the sources dashboard
    per_source: HashMap<String, u64>,

    current: MetricsSample,
    history: VecDeque<MetricsSample>,

    command_rx: mpsc::Receiver<SamplerCommand>,
    record_rx: broadcast::Receiver<RecordEvent>,
    hub: HubHandle,
}

impl MetricsSampler {
    pub fn new(
        interval: Duration,
        command_rx: mpsc::Receiver<SamplerCommand>,
        record_rx: broadcast::Receiver<RecordEvent>,
        hub: HubHandle,
    ) -> Self {
        Self {
            interval,
            total_processed: 0,
            last_total: 0,
            last_tick: Instant::now(),
            per_source: HashMap::new(),
            current: MetricsSample {
                data_processing_rate: 0,
                total_processed: 0,
                sampled_at: Utc::now(),
            },
            history: VecDeque::new(),
            command_rx,
            record_rx,
            hub,
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting metrics sampler (interval {:?})", self.interval);

        let mut tick = time::interval(self.interval);
        // The first tick fires immediately and would produce a zero-length
        // interval; skip it.
        tick.tick().await;
        self.last_tick = Instant::now();

        loop {
            tokio::select! {
                result = self.record_rx.recv() => {
                    match result {
                        Ok(event) => self.count(&event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            // Lagged records still happened; keep the counter honest
                            self.total_processed += skipped;
                            warn!("sampler lagged, {skipped} records counted without source attribution");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!("record channel closed, shutting down");
                            break;
                        }
                    }
                }

                _ = tick.tick() => {
                    self.sample().await;
                }

                Some(cmd) = self.command_rx.recv() => {
                    if !self.handle_command(cmd) {
                        break;
                    }
                }

                else => break,
            }
        }

        debug!("metrics sampler stopped");
    }

    fn count(&mut self, event: &RecordEvent) {
        self.total_processed += 1;
        let source = match event {
            RecordEvent::Market(r) => r.source.as_str(),
            RecordEvent::Mining(r) => r.source.as_str(),
        };
        *self.per_source.entry(source.to_string()).or_default() += 1;
    }

    async fn sample(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick).as_secs_f64();
        let rate = compute_rate(self.last_total, self.total_processed, elapsed);

        self.last_total = self.total_processed;
        self.last_tick = now;

        self.current = MetricsSample {
            data_processing_rate: rate,
            total_processed: self.total_processed,
            sampled_at: Utc::now(),
        };

        if self.history.len() == MAX_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(self.current.clone());

        trace!(
            rate,
            total = self.total_processed,
            "recorded throughput sample"
        );

        let frame = Frame::new("metrics", json!(self.current));
        self.hub
            .broadcast(frame, Some(CHANNEL_METRICS.to_string()))
            .await;
    }

    /// Returns `false` when the actor should stop.
    fn handle_command(&mut self, cmd: SamplerCommand) -> bool {
        match cmd {
            SamplerCommand::CurrentSample { respond_to } => {
                let _ = respond_to.send(self.current.clone());
            }

            SamplerCommand::History { since, respond_to } => {
                let samples = self
                    .history
                    .iter()
                    .filter(|s| s.sampled_at >= since)
                    .cloned()
                    .collect();
                let _ = respond_to.send(samples);
            }

            SamplerCommand::SourceEstimates { respond_to } => {
                let _ = respond_to.send(self.source_estimates());
            }

            SamplerCommand::Shutdown => {
                debug!("received shutdown command");
                return false;
            }
        }

        true
    }

    /// Per-source throughput breakdown.
    ///
    /// The overall rate is apportioned by each source's share of the total
    /// counter. An approximation for display, not an exact per-source rate.
    fn source_estimates(&self) -> Value {
        let total = self.total_processed.max(1) as f64;
        let rate = self.current.data_processing_rate as f64;

        let sources: Vec<Value> = self
            .per_source
            .iter()
            .map(|(source, count)| {
                let share = *count as f64 / total;
                json!({
                    "source": source,
                    "totalRecords": count,
                    "estimatedRate": (rate * share).round() as u64,
                    "active": self.current.data_processing_rate > 0,
                })
            })
            .collect();

        json!({
            "sources": sources,
            "totalProcessed": self.total_processed,
            "dataProcessingRate": self.current.data_processing_rate,
        })
    }
}

/// Handle for interacting with the MetricsSampler
#[derive(Debug, Clone)]
pub struct SamplerHandle {
    sender: mpsc::Sender<SamplerCommand>,
}

impl SamplerHandle {
    /// Spawn a metrics sampler with the given sampling interval.
    pub fn spawn(
        interval: Duration,
        record_rx: broadcast::Receiver<RecordEvent>,
        hub: HubHandle,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = MetricsSampler::new(interval, cmd_rx, record_rx, hub);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// The most recent sample. `None` when the sampler is gone.
    pub async fn current_sample(&self) -> Option<MetricsSample> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SamplerCommand::CurrentSample { respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Samples recorded since `since`, oldest first.
    pub async fn history(&self, since: DateTime<Utc>) -> Vec<MetricsSample> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(SamplerCommand::History {
                since,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Per-source throughput estimates for the sources dashboard.
    pub async fn source_estimates(&self) -> Option<Value> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SamplerCommand::SourceEstimates { respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Shutdown the sampler
    pub async fn shutdown(&self) {
        let _ = self.sender.send(SamplerCommand::Shutdown).await;
    }
}
