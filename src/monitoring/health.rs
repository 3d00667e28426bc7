//! System health probing
//!
//! Samples process-local memory and CPU through sysinfo and combines them
//! with the storage and hub checks into a detailed health report. The pure
//! fallback heuristic in [`fallback_health`] exists for when the detailed
//! path itself fails; it depends only on numbers already in hand and can
//! never fail.

use serde::Serialize;
use serde_json::{Value, json};
use sysinfo::System;

/// Memory usage above this percentage is unhealthy
pub const MEMORY_THRESHOLD_PCT: f64 = 90.0;
/// CPU usage above this percentage is unhealthy
pub const CPU_THRESHOLD_PCT: f64 = 80.0;

/// Overall health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

impl SystemHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemHealth::Healthy => "healthy",
            SystemHealth::Degraded => "degraded",
            SystemHealth::Unhealthy => "unhealthy",
        }
    }
}

/// One sub-check in the detailed health report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub name: String,
    pub healthy: bool,
    pub message: String,
}

impl HealthCheck {
    pub fn new(name: &str, healthy: bool, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            healthy,
            message: message.into(),
        }
    }
}

/// Memory and CPU usage sampled from the host.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSample {
    pub memory_pct: f64,
    pub cpu_pct: f64,
}

/// Wrapper around a sysinfo [`System`] kept alive between samples so CPU
/// usage deltas are meaningful.
pub struct SystemProbe {
    sys: System,
}

impl SystemProbe {
    pub fn new() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        Self { sys }
    }

    /// Refresh and sample memory and CPU usage as percentages.
    pub fn sample(&mut self) -> ResourceSample {
        self.sys.refresh_memory();
        self.sys.refresh_cpu_usage();

        let total = self.sys.total_memory().max(1);
        let memory_pct = self.sys.used_memory() as f64 / total as f64 * 100.0;

        let cpus = self.sys.cpus();
        let cpu_pct = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|cpu| cpu.cpu_usage() as f64).sum::<f64>() / cpus.len() as f64
        };

        ResourceSample {
            memory_pct,
            cpu_pct,
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Overall verdict from individual sub-checks: all passing is healthy, one
/// failure is degraded, more than one is unhealthy.
pub fn overall_health(checks: &[HealthCheck]) -> SystemHealth {
    match checks.iter().filter(|c| !c.healthy).count() {
        0 => SystemHealth::Healthy,
        1 => SystemHealth::Degraded,
        _ => SystemHealth::Unhealthy,
    }
}

/// Last-resort health heuristic, pure and infallible.
///
/// Unhealthy only when memory exceeds 90%, CPU exceeds 80%, or the
/// persistence layer reports zero connections.
pub fn fallback_health(memory_pct: f64, cpu_pct: f64, storage_connections: usize) -> SystemHealth {
    if memory_pct > MEMORY_THRESHOLD_PCT || cpu_pct > CPU_THRESHOLD_PCT || storage_connections == 0
    {
        SystemHealth::Unhealthy
    } else {
        SystemHealth::Healthy
    }
}

/// Render a health report payload from a verdict and its sub-checks.
pub fn health_payload(status: SystemHealth, checks: &[HealthCheck], fallback: bool) -> Value {
    json!({
        "status": status,
        "checks": checks,
        "fallback": fallback,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}
