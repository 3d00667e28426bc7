//! PerformanceActor - request timing and error-rate accounting
//!
//! The HTTP layer reports one observation per handled request. Observations
//! are kept in a bounded window and summarized on demand for the
//! performance dashboard and for the error-rate alerting check.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, warn};

/// Observations retained before the oldest are dropped
const MAX_OBSERVATIONS: usize = 10_000;

#[derive(Debug, Clone)]
struct Observation {
    duration_ms: u64,
    error: bool,
    at: DateTime<Utc>,
}

/// Request statistics over a queried window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub total_requests: usize,
    /// Failed requests as a percentage of the total
    pub error_rate: f64,
    pub average_response_time_ms: f64,
    pub requests_per_second: f64,
}

impl PerformanceSummary {
    fn empty() -> Self {
        Self {
            total_requests: 0,
            error_rate: 0.0,
            average_response_time_ms: 0.0,
            requests_per_second: 0.0,
        }
    }
}

enum PerformanceCommand {
    Record {
        duration_ms: u64,
        error: bool,
    },
    Report {
        since: DateTime<Utc>,
        respond_to: oneshot::Sender<PerformanceSummary>,
    },
    Shutdown,
}

struct PerformanceActor {
    observations: VecDeque<Observation>,
    command_rx: mpsc::Receiver<PerformanceCommand>,
}

impl PerformanceActor {
    fn new(command_rx: mpsc::Receiver<PerformanceCommand>) -> Self {
        Self {
            observations: VecDeque::new(),
            command_rx,
        }
    }

    #[instrument(skip(self))]
    async fn run(mut self) {
        debug!("starting performance tracker");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                PerformanceCommand::Record { duration_ms, error } => {
                    if self.observations.len() == MAX_OBSERVATIONS {
                        self.observations.pop_front();
                    }
                    self.observations.push_back(Observation {
                        duration_ms,
                        error,
                        at: Utc::now(),
                    });
                }

                PerformanceCommand::Report { since, respond_to } => {
                    let _ = respond_to.send(self.report(since));
                }

                PerformanceCommand::Shutdown => {
                    debug!("received shutdown command");
                    break;
                }
            }
        }

        debug!("performance tracker stopped");
    }

    fn report(&self, since: DateTime<Utc>) -> PerformanceSummary {
        let window: Vec<&Observation> =
            self.observations.iter().filter(|o| o.at >= since).collect();

        if window.is_empty() {
            return PerformanceSummary::empty();
        }

        let total = window.len();
        let errors = window.iter().filter(|o| o.error).count();
        let total_ms: u64 = window.iter().map(|o| o.duration_ms).sum();

        let window_secs = (Utc::now() - since).num_milliseconds().max(1) as f64 / 1000.0;

        PerformanceSummary {
            total_requests: total,
            error_rate: errors as f64 / total as f64 * 100.0,
            average_response_time_ms: total_ms as f64 / total as f64,
            requests_per_second: total as f64 / window_secs,
        }
    }
}

/// Handle for reporting and querying request performance
#[derive(Debug, Clone)]
pub struct PerformanceHandle {
    sender: mpsc::Sender<PerformanceCommand>,
}

impl PerformanceHandle {
    /// Spawn the performance tracker actor.
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(1024);

        let actor = PerformanceActor::new(cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Record one handled request without waiting. Called from the request
    /// path, so it must never block on monitoring.
    pub fn record(&self, duration_ms: u64, error: bool) {
        if self
            .sender
            .try_send(PerformanceCommand::Record { duration_ms, error })
            .is_err()
        {
            warn!("performance tracker unavailable, dropping observation");
        }
    }

    /// Summary of requests handled since `since`. `None` when the tracker
    /// is gone.
    pub async fn report(&self, since: DateTime<Utc>) -> Option<PerformanceSummary> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PerformanceCommand::Report {
                since,
                respond_to: tx,
            })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Shutdown the performance tracker
    pub async fn shutdown(&self) {
        let _ = self.sender.send(PerformanceCommand::Shutdown).await;
    }
}
