//! ErrorTrackerActor - central sink for operational failures
//!
//! Every non-fatal failure in the pipeline (persistence errors, relay
//! trouble, monitoring sub-query failures) is reported here. Records carry
//! a severity classified from their context, are deduplicated by a
//! `(type, message)` fingerprint for counting, and can be queried back by
//! time range and severity for the errors dashboard.
//!
//! Tracking is fire-and-forget by design: a failure to record an error is
//! logged and swallowed, never re-raised into the reporting code path.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, warn};

/// Error records retained before the oldest are dropped
const MAX_RECORDS: usize = 1000;

/// Severity of a tracked error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            _ => None,
        }
    }
}

/// Classify severity from the error's type and context.
///
/// Keyword heuristic over the reporting site's wording; anything
/// unrecognized is `medium`.
pub fn classify_severity(error_type: &str, message: &str, context: &str) -> Severity {
    let haystack = format!("{error_type} {message} {context}").to_lowercase();

    const CRITICAL: &[&str] = &["fatal", "panic", "corrupt", "unavailable", "out of memory"];
    const HIGH: &[&str] = &["timeout", "refused", "unreachable", "persistence", "database"];
    const LOW: &[&str] = &["retry", "transient", "deprecated"];

    if CRITICAL.iter().any(|kw| haystack.contains(kw)) {
        Severity::Critical
    } else if HIGH.iter().any(|kw| haystack.contains(kw)) {
        Severity::High
    } else if LOW.iter().any(|kw| haystack.contains(kw)) {
        Severity::Low
    } else {
        Severity::Medium
    }
}

/// A single tracked failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub severity: Severity,
    pub message: String,
    pub context: String,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
}

/// Aggregate counts over a queried window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSummary {
    pub total_errors: usize,
    pub unique_errors: usize,
    pub critical_errors: usize,
}

/// Result of an error query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub errors: Vec<ErrorRecord>,
    pub summary: ErrorSummary,
}

enum ErrorCommand {
    Track {
        error_type: String,
        message: String,
        context: String,
        respond_to: Option<oneshot::Sender<ErrorRecord>>,
    },
    Query {
        since: DateTime<Utc>,
        severity: Option<Severity>,
        respond_to: oneshot::Sender<ErrorReport>,
    },
    Shutdown,
}

/// Actor owning the error log.
struct ErrorTrackerActor {
    records: VecDeque<ErrorRecord>,
    /// Occurrence counts keyed by `(type, message)` fingerprint
    fingerprints: HashMap<String, u64>,
    next_id: u64,
    command_rx: mpsc::Receiver<ErrorCommand>,
}

impl ErrorTrackerActor {
    fn new(command_rx: mpsc::Receiver<ErrorCommand>) -> Self {
        Self {
            records: VecDeque::new(),
            fingerprints: HashMap::new(),
            next_id: 1,
            command_rx,
        }
    }

    #[instrument(skip(self))]
    async fn run(mut self) {
        debug!("starting error tracker");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                ErrorCommand::Track {
                    error_type,
                    message,
                    context,
                    respond_to,
                } => {
                    let record = self.track(error_type, message, context);
                    if let Some(respond_to) = respond_to {
                        let _ = respond_to.send(record);
                    }
                }

                ErrorCommand::Query {
                    since,
                    severity,
                    respond_to,
                } => {
                    let _ = respond_to.send(self.query(since, severity));
                }

                ErrorCommand::Shutdown => {
                    debug!("received shutdown command");
                    break;
                }
            }
        }

        debug!("error tracker stopped");
    }

    fn track(&mut self, error_type: String, message: String, context: String) -> ErrorRecord {
        let severity = classify_severity(&error_type, &message, &context);
        let fingerprint = format!("{error_type}|{message}");
        *self.fingerprints.entry(fingerprint).or_default() += 1;

        let record = ErrorRecord {
            id: format!("err-{}", self.next_id),
            error_type,
            severity,
            message,
            context,
            timestamp: Utc::now(),
            resolved: false,
        };
        self.next_id += 1;

        debug!(
            id = %record.id,
            severity = ?record.severity,
            "tracked error: {}",
            record.message
        );

        if self.records.len() == MAX_RECORDS {
            self.records.pop_front();
        }
        self.records.push_back(record.clone());

        record
    }

    fn query(&self, since: DateTime<Utc>, severity: Option<Severity>) -> ErrorReport {
        let errors: Vec<ErrorRecord> = self
            .records
            .iter()
            .filter(|r| r.timestamp >= since)
            .filter(|r| severity.is_none_or(|s| r.severity == s))
            .cloned()
            .collect();

        let unique: std::collections::HashSet<_> = errors
            .iter()
            .map(|r| (r.error_type.as_str(), r.message.as_str()))
            .collect();

        let summary = ErrorSummary {
            total_errors: errors.len(),
            unique_errors: unique.len(),
            critical_errors: errors
                .iter()
                .filter(|r| r.severity == Severity::Critical)
                .count(),
        };

        ErrorReport { errors, summary }
    }
}

/// Handle for reporting and querying tracked errors
#[derive(Debug, Clone)]
pub struct ErrorTrackerHandle {
    sender: mpsc::Sender<ErrorCommand>,
}

impl ErrorTrackerHandle {
    /// Spawn the error tracker actor.
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);

        let actor = ErrorTrackerActor::new(cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Record a failure and return the created record. `None` when the
    /// tracker itself is gone, which is logged rather than escalated.
    pub async fn track(
        &self,
        error_type: &str,
        message: &str,
        context: &str,
    ) -> Option<ErrorRecord> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(ErrorCommand::Track {
                error_type: error_type.to_string(),
                message: message.to_string(),
                context: context.to_string(),
                respond_to: Some(tx),
            })
            .await
            .is_err()
        {
            warn!("error tracker unavailable, dropping: {message}");
            return None;
        }
        rx.await.ok()
    }

    /// Record a failure without waiting. Safe to call from actor loops that
    /// must not block on monitoring.
    pub fn track_nowait(&self, error_type: &str, message: &str, context: &str) {
        let result = self.sender.try_send(ErrorCommand::Track {
            error_type: error_type.to_string(),
            message: message.to_string(),
            context: context.to_string(),
            respond_to: None,
        });
        if result.is_err() {
            warn!("error tracker unavailable, dropping: {message}");
        }
    }

    /// Errors recorded since `since`, optionally filtered by severity.
    /// `None` when the tracker is gone.
    pub async fn query(
        &self,
        since: DateTime<Utc>,
        severity: Option<Severity>,
    ) -> Option<ErrorReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ErrorCommand::Query {
                since,
                severity,
                respond_to: tx,
            })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Shutdown the error tracker
    pub async fn shutdown(&self) {
        let _ = self.sender.send(ErrorCommand::Shutdown).await;
    }
}
