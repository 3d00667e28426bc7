//! AlertingActor - alert lifecycle and multi-channel dispatch
//!
//! Alerts are raised by the monitoring aggregator when a tracked condition
//! crosses a threshold. Lifecycle:
//!
//! ```text
//! triggered ──acknowledge()──► acknowledged
//!     │                             │
//!     └────── condition clears ─────┴──► resolved
//! ```
//!
//! Acknowledgment is only ever explicit. Resolution only happens when the
//! issuing condition clears; an alert for a still-firing condition is
//! deduplicated instead of re-triggered.
//!
//! Dispatch channels (`log`, `webhook`, `websocket`) are independent: a
//! failure on one channel never blocks the others.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

use crate::actors::hub::HubHandle;
use crate::actors::messages::{CHANNEL_ALERTS, Frame};

use super::errors::Severity;

/// Alerts retained before the oldest resolved ones are dropped
const MAX_ALERTS: usize = 500;

/// Lifecycle state of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Triggered,
    Acknowledged,
    Resolved,
}

/// A raised alert.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub channels: Vec<String>,
    pub state: AlertState,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Condition key for deduplication and resolution, not shown to clients
    #[serde(skip)]
    condition: Option<String>,
}

/// Counts over the retained alert history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStats {
    pub total: usize,
    pub active: usize,
    pub acknowledged: usize,
    pub resolved: usize,
}

/// Alert list plus stats for the alerts dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsReport {
    pub alerts: Vec<Alert>,
    pub stats: AlertStats,
}

enum AlertCommand {
    Trigger {
        title: String,
        message: String,
        severity: Severity,
        channels: Vec<String>,
        condition: Option<String>,
        respond_to: oneshot::Sender<String>,
    },
    Acknowledge {
        id: String,
        respond_to: oneshot::Sender<Result<Alert, String>>,
    },
    ResolveCondition {
        condition: String,
    },
    List {
        respond_to: oneshot::Sender<AlertsReport>,
    },
    Shutdown,
}

struct AlertingActor {
    alerts: Vec<Alert>,
    next_id: u64,
    client: Client,
    webhook_url: Option<String>,
    hub: HubHandle,
    command_rx: mpsc::Receiver<AlertCommand>,
}

impl AlertingActor {
    fn new(
        webhook_url: Option<String>,
        hub: HubHandle,
        command_rx: mpsc::Receiver<AlertCommand>,
    ) -> Self {
        Self {
            alerts: Vec::new(),
            next_id: 1,
            client: Client::new(),
            webhook_url,
            hub,
            command_rx,
        }
    }

    #[instrument(skip(self))]
    async fn run(mut self) {
        debug!("starting alerting actor");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                AlertCommand::Trigger {
                    title,
                    message,
                    severity,
                    channels,
                    condition,
                    respond_to,
                } => {
                    let id = self.trigger(title, message, severity, channels, condition).await;
                    let _ = respond_to.send(id);
                }

                AlertCommand::Acknowledge { id, respond_to } => {
                    let _ = respond_to.send(self.acknowledge(&id));
                }

                AlertCommand::ResolveCondition { condition } => {
                    self.resolve_condition(&condition);
                }

                AlertCommand::List { respond_to } => {
                    let _ = respond_to.send(self.report());
                }

                AlertCommand::Shutdown => {
                    debug!("received shutdown command");
                    break;
                }
            }
        }

        debug!("alerting actor stopped");
    }

    async fn trigger(
        &mut self,
        title: String,
        message: String,
        severity: Severity,
        channels: Vec<String>,
        condition: Option<String>,
    ) -> String {
        // A still-firing condition keeps its existing alert
        if let Some(condition) = &condition {
            if let Some(existing) = self.alerts.iter().find(|a| {
                a.state != AlertState::Resolved && a.condition.as_deref() == Some(condition)
            }) {
                debug!("condition {condition:?} already has active alert {}", existing.id);
                return existing.id.clone();
            }
        }

        let alert = Alert {
            id: format!("alert-{}", self.next_id),
            title,
            message,
            severity,
            channels,
            state: AlertState::Triggered,
            created_at: Utc::now(),
            acknowledged_at: None,
            condition,
        };
        self.next_id += 1;

        info!(
            id = %alert.id,
            severity = ?alert.severity,
            "alert triggered: {}",
            alert.title
        );

        self.dispatch(&alert).await;

        if self.alerts.len() == MAX_ALERTS {
            if let Some(pos) = self.alerts.iter().position(|a| a.state == AlertState::Resolved) {
                self.alerts.remove(pos);
            } else {
                self.alerts.remove(0);
            }
        }

        let id = alert.id.clone();
        self.alerts.push(alert);
        id
    }

    /// Deliver to each requested channel independently.
    async fn dispatch(&self, alert: &Alert) {
        for channel in &alert.channels {
            match channel.as_str() {
                "log" => {
                    warn!(
                        "[ALERT] {} ({:?}): {}",
                        alert.title, alert.severity, alert.message
                    );
                }

                "websocket" => {
                    let frame = Frame::new("alert", json!(alert));
                    self.hub
                        .broadcast(frame, Some(CHANNEL_ALERTS.to_string()))
                        .await;
                }

                "webhook" => {
                    let Some(url) = &self.webhook_url else {
                        warn!("webhook channel requested but no webhook URL configured");
                        continue;
                    };

                    let payload = json!({
                        "title": alert.title,
                        "message": alert.message,
                        "severity": alert.severity,
                        "alertId": alert.id,
                        "timestamp": Utc::now().to_rfc3339(),
                    });

                    // Delivery happens off the actor loop so a slow endpoint
                    // cannot stall alert handling
                    let client = self.client.clone();
                    let url = url.clone();
                    tokio::spawn(async move {
                        match client.post(&url).json(&payload).send().await {
                            Ok(response) if response.status().is_success() => {
                                info!("successfully sent webhook alert");
                            }
                            Ok(response) => {
                                error!("webhook alert failed with status: {}", response.status());
                            }
                            Err(e) => {
                                error!("failed to send webhook alert: {e}");
                            }
                        }
                    });
                }

                other => {
                    warn!("unknown alert channel {other:?}, skipping");
                }
            }
        }
    }

    fn acknowledge(&mut self, id: &str) -> Result<Alert, String> {
        let Some(alert) = self.alerts.iter_mut().find(|a| a.id == id) else {
            return Err(format!("alert {id} not found"));
        };

        match alert.state {
            AlertState::Triggered => {
                alert.state = AlertState::Acknowledged;
                alert.acknowledged_at = Some(Utc::now());
                debug!("alert {id} acknowledged");
                Ok(alert.clone())
            }
            AlertState::Acknowledged => Err(format!("alert {id} already acknowledged")),
            AlertState::Resolved => Err(format!("alert {id} already resolved")),
        }
    }

    fn resolve_condition(&mut self, condition: &str) {
        for alert in self.alerts.iter_mut().filter(|a| {
            a.state != AlertState::Resolved && a.condition.as_deref() == Some(condition)
        }) {
            debug!("alert {} resolved, condition {condition:?} cleared", alert.id);
            alert.state = AlertState::Resolved;
        }
    }

    fn report(&self) -> AlertsReport {
        let stats = AlertStats {
            total: self.alerts.len(),
            active: self
                .alerts
                .iter()
                .filter(|a| a.state == AlertState::Triggered)
                .count(),
            acknowledged: self
                .alerts
                .iter()
                .filter(|a| a.state == AlertState::Acknowledged)
                .count(),
            resolved: self
                .alerts
                .iter()
                .filter(|a| a.state == AlertState::Resolved)
                .count(),
        };

        AlertsReport {
            alerts: self.alerts.clone(),
            stats,
        }
    }
}

/// Handle for raising and managing alerts
#[derive(Debug, Clone)]
pub struct AlertingHandle {
    sender: mpsc::Sender<AlertCommand>,
}

impl AlertingHandle {
    /// Spawn the alerting actor.
    pub fn spawn(webhook_url: Option<String>, hub: HubHandle) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        let actor = AlertingActor::new(webhook_url, hub, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Raise an alert and return its id. A condition key deduplicates: a
    /// still-active alert for the same condition is returned instead of a
    /// new one. `None` when the alerting actor is gone.
    pub async fn trigger(
        &self,
        title: &str,
        message: &str,
        severity: Severity,
        channels: Vec<String>,
        condition: Option<&str>,
    ) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::Trigger {
                title: title.to_string(),
                message: message.to_string(),
                severity,
                channels,
                condition: condition.map(str::to_string),
                respond_to: tx,
            })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Acknowledge a triggered alert. `Err` for unknown, already
    /// acknowledged, or already resolved alerts.
    pub async fn acknowledge(&self, id: &str) -> Result<Alert, String> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::Acknowledge {
                id: id.to_string(),
                respond_to: tx,
            })
            .await
            .map_err(|_| "alerting actor unavailable".to_string())?;
        rx.await
            .map_err(|_| "alerting actor dropped request".to_string())?
    }

    /// Resolve all active alerts raised for the given condition.
    pub async fn resolve_condition(&self, condition: &str) {
        let _ = self
            .sender
            .send(AlertCommand::ResolveCondition {
                condition: condition.to_string(),
            })
            .await;
    }

    /// Alert list plus stats. `None` when the alerting actor is gone.
    pub async fn list(&self) -> Option<AlertsReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::List { respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Shutdown the alerting actor
    pub async fn shutdown(&self) {
        let _ = self.sender.send(AlertCommand::Shutdown).await;
    }
}
