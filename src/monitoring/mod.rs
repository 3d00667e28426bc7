//! Self-monitoring: health, performance, errors, and alerting
//!
//! The [`MonitorAggregator`] composes four independent concerns behind one
//! degrade-gracefully surface:
//!
//! - **health**: process resources plus storage and hub reachability
//! - **performance**: request timings reported by the HTTP layer
//! - **errors**: the central error tracker
//! - **alerts**: threshold alerts with an acknowledgment workflow
//!
//! Every query on the aggregator answers even when a sub-system is down.
//! Detailed health falls back to a pure local heuristic; the dashboard
//! falls back to a fully-populated zeroed structure. Monitoring failures
//! are never surfaced as errors to health or dashboard callers.

pub mod alerts;
pub mod errors;
pub mod health;
pub mod performance;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::actors::hub::HubHandle;
use crate::actors::sampler::SamplerHandle;
use crate::actors::storage::StorageHandle;
use crate::util::format_uptime;

use alerts::AlertingHandle;
use errors::{ErrorRecord, ErrorTrackerHandle, Severity};
use health::{HealthCheck, SystemHealth, SystemProbe};
use performance::PerformanceHandle;

/// How long a storage health probe may take before the detailed health
/// path gives up on it
const STORAGE_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Error-rate checks need at least this many requests in the window
const ERROR_RATE_MIN_REQUESTS: usize = 10;

/// Window for the error-rate alerting check
const ERROR_RATE_WINDOW: chrono::Duration = chrono::Duration::seconds(60);

const ERROR_RATE_CONDITION: &str = "error-rate";

/// Facade over the monitoring sub-systems. Cheap to clone; shared by the
/// HTTP layer and the ingestion actors.
#[derive(Clone)]
pub struct MonitorAggregator {
    hub: HubHandle,
    storage: StorageHandle,
    sampler: SamplerHandle,
    pub errors: ErrorTrackerHandle,
    pub performance: PerformanceHandle,
    pub alerting: AlertingHandle,
    probe: Arc<Mutex<SystemProbe>>,
    /// Connections seen on the last successful storage probe, feeding the
    /// fallback heuristic when the probe itself stops answering
    last_storage_connections: Arc<AtomicUsize>,
    started_at: DateTime<Utc>,
    alert_channels: Vec<String>,
    error_rate_threshold: f64,
}

impl MonitorAggregator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hub: HubHandle,
        storage: StorageHandle,
        sampler: SamplerHandle,
        errors: ErrorTrackerHandle,
        performance: PerformanceHandle,
        alerting: AlertingHandle,
        alert_channels: Vec<String>,
        error_rate_threshold: f64,
    ) -> Self {
        Self {
            hub,
            storage,
            sampler,
            errors,
            performance,
            alerting,
            probe: Arc::new(Mutex::new(SystemProbe::new())),
            last_storage_connections: Arc::new(AtomicUsize::new(1)),
            started_at: Utc::now(),
            alert_channels,
            error_rate_threshold,
        }
    }

    pub fn uptime_ms(&self) -> u64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as u64
    }

    /// Detailed health with four sub-checks, falling back to a pure
    /// heuristic when the detailed path cannot answer. Always succeeds.
    pub async fn get_health(&self) -> Value {
        let sample = self.probe.lock().await.sample();

        let storage_result = timeout(STORAGE_PROBE_TIMEOUT, self.storage.health_check()).await;
        let hub_count = self.hub.connection_count().await;

        let (storage_health, hub_count) = match (storage_result, hub_count) {
            (Ok(Ok(storage_health)), Some(hub_count)) => (storage_health, hub_count),
            (storage_result, _) => {
                // Detailed path is down; answer from numbers already in hand
                warn!("detailed health check unavailable, using fallback heuristic");
                let connections = match storage_result {
                    Ok(Ok(h)) => h.connections,
                    _ => 0,
                };
                let status = health::fallback_health(sample.memory_pct, sample.cpu_pct, connections);
                return health::health_payload(status, &[], true);
            }
        };

        self.last_storage_connections
            .store(storage_health.connections, Ordering::Relaxed);

        let checks = vec![
            HealthCheck::new(
                "memory",
                sample.memory_pct <= health::MEMORY_THRESHOLD_PCT,
                format!("{:.1}% used", sample.memory_pct),
            ),
            HealthCheck::new(
                "cpu",
                sample.cpu_pct <= health::CPU_THRESHOLD_PCT,
                format!("{:.1}% used", sample.cpu_pct),
            ),
            HealthCheck::new(
                "storage",
                storage_health.healthy && storage_health.connections > 0,
                storage_health.message,
            ),
            HealthCheck::new("hub", true, format!("{hub_count} active connections")),
        ];

        health::health_payload(health::overall_health(&checks), &checks, false)
    }

    /// One-call overview for the dashboard. Runs the health, performance,
    /// error, and alert queries concurrently; if any of them fails, the
    /// whole overview is replaced by a fully-populated zeroed fallback.
    /// Always succeeds.
    pub async fn get_dashboard(&self) -> Value {
        let since = Utc::now() - chrono::Duration::hours(1);

        let (health, performance, errors, alerts, sample) = tokio::join!(
            self.get_health(),
            self.performance.report(since),
            self.errors.query(since, None),
            self.alerting.list(),
            self.sampler.current_sample(),
        );

        let (Some(performance), Some(errors), Some(alerts)) = (performance, errors, alerts) else {
            warn!("dashboard sub-query failed, returning fallback overview");
            return self.fallback_dashboard().await;
        };

        let (rate, total) = sample
            .map(|s| (s.data_processing_rate, s.total_processed))
            .unwrap_or((0, 0));

        json!({
            "systemHealth": health["status"],
            "uptime": format_uptime(self.uptime_ms()),
            "activeAlerts": alerts.stats.active,
            "errorRate": performance.error_rate,
            "averageResponseTime": performance.average_response_time_ms,
            "dataProcessingRate": rate,
            "totalProcessed": total,
            "health": health,
            "performance": performance,
            "errors": errors.summary,
            "alerts": alerts.stats,
            "fallback": false,
            "timestamp": Utc::now().to_rfc3339(),
        })
    }

    /// Zeroed overview with a heuristic health verdict. The dashboard
    /// contract guarantees this shape even under total monitoring outage.
    async fn fallback_dashboard(&self) -> Value {
        let sample = self.probe.lock().await.sample();
        let connections = self.last_storage_connections.load(Ordering::Relaxed);
        let status = health::fallback_health(sample.memory_pct, sample.cpu_pct, connections);

        json!({
            "systemHealth": status,
            "uptime": format_uptime(self.uptime_ms()),
            "activeAlerts": 0,
            "errorRate": 0.0,
            "averageResponseTime": 0.0,
            "dataProcessingRate": 0,
            "totalProcessed": 0,
            "health": health::health_payload(status, &[], true),
            "performance": { "totalRequests": 0, "errorRate": 0.0, "averageResponseTimeMs": 0.0, "requestsPerSecond": 0.0 },
            "errors": { "totalErrors": 0, "uniqueErrors": 0, "criticalErrors": 0 },
            "alerts": { "total": 0, "active": 0, "acknowledged": 0, "resolved": 0 },
            "fallback": true,
            "timestamp": Utc::now().to_rfc3339(),
        })
    }

    /// Record a failure. Critical errors raise an alert on the configured
    /// channels. Returns the record, or `None` when tracking itself failed
    /// (logged, never re-raised).
    pub async fn track_error(
        &self,
        error_type: &str,
        message: &str,
        context: &str,
    ) -> Option<ErrorRecord> {
        let record = self.errors.track(error_type, message, context).await?;

        if record.severity == Severity::Critical {
            self.alerting
                .trigger(
                    &format!("Critical error: {error_type}"),
                    message,
                    Severity::Critical,
                    self.alert_channels.clone(),
                    Some(&format!("critical:{error_type}")),
                )
                .await;
        }

        Some(record)
    }

    /// Record one handled request and re-evaluate the error-rate alert
    /// condition over the recent window.
    pub async fn record_request(&self, duration_ms: u64, error: bool) {
        self.performance.record(duration_ms, error);

        let Some(summary) = self.performance.report(Utc::now() - ERROR_RATE_WINDOW).await else {
            return;
        };

        if summary.total_requests < ERROR_RATE_MIN_REQUESTS {
            return;
        }

        if summary.error_rate > self.error_rate_threshold {
            debug!(
                "error rate {:.1}% over threshold {:.1}%",
                summary.error_rate, self.error_rate_threshold
            );
            self.alerting
                .trigger(
                    "High error rate",
                    &format!(
                        "{:.1}% of requests failed over the last minute",
                        summary.error_rate
                    ),
                    Severity::High,
                    self.alert_channels.clone(),
                    Some(ERROR_RATE_CONDITION),
                )
                .await;
        } else {
            self.alerting.resolve_condition(ERROR_RATE_CONDITION).await;
        }
    }

    /// Legacy status payload: uptime, throughput, connections.
    pub async fn system_status(&self) -> Value {
        let sample = self.sampler.current_sample().await;
        let connections = self.hub.connection_count().await.unwrap_or(0);

        let (rate, total) = sample
            .map(|s| (s.data_processing_rate, s.total_processed))
            .unwrap_or((0, 0));

        json!({
            "status": "online",
            "uptime": format_uptime(self.uptime_ms()),
            "connections": connections,
            "totalProcessed": total,
            "dataProcessingRate": rate,
            "timestamp": Utc::now().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryBackend;
    use tokio::sync::broadcast;

    fn spawn_aggregator() -> MonitorAggregator {
        let hub = HubHandle::spawn(Duration::from_secs(30));
        let errors = ErrorTrackerHandle::spawn();
        let (record_tx, record_rx) = broadcast::channel(64);
        let storage =
            StorageHandle::spawn(Box::new(MemoryBackend::new()), record_rx, errors.clone());
        let (tx2, record_rx2) = broadcast::channel(64);
        let sampler = SamplerHandle::spawn(Duration::from_secs(10), record_rx2, hub.clone());
        // Keep the record channels open for the lifetime of the test so the
        // storage and sampler actors do not shut down on channel close
        std::mem::forget(record_tx);
        std::mem::forget(tx2);
        let performance = PerformanceHandle::spawn();
        let alerting = AlertingHandle::spawn(None, hub.clone());

        MonitorAggregator::new(
            hub,
            storage,
            sampler,
            errors,
            performance,
            alerting,
            vec!["log".to_string()],
            25.0,
        )
    }

    #[tokio::test]
    async fn health_reports_four_checks_when_everything_answers() {
        let monitor = spawn_aggregator();

        let health = monitor.get_health().await;
        assert_eq!(health["fallback"], false);
        assert_eq!(health["checks"].as_array().unwrap().len(), 4);

        let names: Vec<&str> = health["checks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["memory", "cpu", "storage", "hub"]);
    }

    #[tokio::test]
    async fn health_falls_back_when_storage_actor_is_gone() {
        let monitor = spawn_aggregator();
        monitor.storage.shutdown().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let health = monitor.get_health().await;
        assert_eq!(health["fallback"], true);
        // Zero storage connections drives the heuristic to unhealthy
        assert_eq!(health["status"], "unhealthy");
    }

    #[tokio::test]
    async fn dashboard_composes_all_sections() {
        let monitor = spawn_aggregator();
        monitor.record_request(42, false).await;

        let dashboard = monitor.get_dashboard().await;
        assert_eq!(dashboard["fallback"], false);
        assert!(dashboard["systemHealth"].is_string());
        assert!(dashboard["uptime"].is_string());
        assert_eq!(dashboard["errors"]["totalErrors"], 0);
        assert_eq!(dashboard["alerts"]["active"], 0);
    }

    #[tokio::test]
    async fn dashboard_falls_back_when_a_subquery_fails() {
        let monitor = spawn_aggregator();
        monitor.performance.shutdown().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let dashboard = monitor.get_dashboard().await;
        assert_eq!(dashboard["fallback"], true);
        // Shape is fully populated despite the outage
        assert_eq!(dashboard["errorRate"], 0.0);
        assert_eq!(dashboard["activeAlerts"], 0);
        assert!(dashboard["systemHealth"].is_string());
        assert!(dashboard["uptime"].is_string());
    }

    #[tokio::test]
    async fn critical_error_raises_an_alert() {
        let monitor = spawn_aggregator();

        let record = monitor
            .track_error("storage", "database unavailable", "flush")
            .await
            .unwrap();
        assert_eq!(record.severity, Severity::Critical);

        let report = monitor.alerting.list().await.unwrap();
        assert_eq!(report.stats.active, 1);
        assert!(report.alerts[0].title.contains("storage"));
    }

    #[tokio::test]
    async fn sustained_error_rate_triggers_then_resolves_alert() {
        let monitor = spawn_aggregator();

        // 10 requests, half failing: 50% > 25% threshold
        for i in 0..10 {
            monitor.record_request(10, i % 2 == 0).await;
        }
        let report = monitor.alerting.list().await.unwrap();
        assert_eq!(report.stats.active, 1);

        // Flood with successes until the rate drops under the threshold
        for _ in 0..40 {
            monitor.record_request(10, false).await;
        }
        let report = monitor.alerting.list().await.unwrap();
        assert_eq!(report.stats.active, 0);
        assert_eq!(report.stats.resolved, 1);
    }

    #[tokio::test]
    async fn status_payload_has_uptime_and_counters() {
        let monitor = spawn_aggregator();

        let status = monitor.system_status().await;
        assert_eq!(status["status"], "online");
        assert_eq!(status["connections"], 0);
        assert_eq!(status["totalProcessed"], 0);
        assert!(status["uptime"].is_string());
    }
}
