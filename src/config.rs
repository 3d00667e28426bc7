use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::trace;

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory ring buffers (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default for most deployments)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./eddn-hub.db")
}

/// Upstream relay connection settings.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RelayConfig {
    /// WebSocket URL of the relay feed. When absent, no relay client is
    /// started (useful for tests and offline development).
    pub url: Option<String>,

    /// Initial reconnect backoff in seconds
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,

    /// Reconnect backoff cap in seconds
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: None,
            backoff_base_secs: default_backoff_base(),
            backoff_cap_secs: default_backoff_cap(),
        }
    }
}

fn default_backoff_base() -> u64 {
    1
}

fn default_backoff_cap() -> u64 {
    60
}

/// Subscription hub settings.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct HubConfig {
    /// Heartbeat sweep interval in seconds. Connections that miss a full
    /// interval without a pong are evicted on the next sweep.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    30
}

/// Metrics sampler settings.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SamplerConfig {
    #[serde(default = "default_sample_interval")]
    pub interval_secs: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sample_interval(),
        }
    }
}

fn default_sample_interval() -> u64 {
    10
}

/// HTTP API settings.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            enable_cors: true,
        }
    }
}

fn default_bind() -> SocketAddr {
    "127.0.0.1:3000".parse().expect("static bind address")
}

fn default_true() -> bool {
    true
}

/// Alerting settings.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct AlertConfig {
    /// Optional webhook URL for the "webhook" alert channel
    pub webhook_url: Option<String>,

    /// Error rate (percent of requests) above which an alert is raised
    #[serde(default = "default_error_rate_threshold")]
    pub error_rate_threshold: Option<f64>,
}

fn default_error_rate_threshold() -> Option<f64> {
    Some(25.0)
}

impl AlertConfig {
    pub fn error_rate_threshold(&self) -> f64 {
        self.error_rate_threshold.unwrap_or(25.0)
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub sampler: SamplerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub alerts: AlertConfig,
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.hub.heartbeat_interval_secs, 30);
        assert_eq!(config.sampler.interval_secs, 10);
        assert!(config.relay.url.is_none());
        assert!(matches!(config.storage, StorageConfig::Sqlite { .. }));
    }

    #[test]
    fn storage_backend_none_parses() {
        let config: Config =
            serde_json::from_str(r#"{ "storage": { "backend": "none" } }"#).unwrap();
        assert!(matches!(config.storage, StorageConfig::None));
    }

    #[test]
    fn relay_url_and_backoff_parse() {
        let config: Config = serde_json::from_str(
            r#"{ "relay": { "url": "ws://localhost:9500/stream", "backoff_cap_secs": 30 } }"#,
        )
        .unwrap();
        assert_eq!(
            config.relay.url.as_deref(),
            Some("ws://localhost:9500/stream")
        );
        assert_eq!(config.relay.backoff_base_secs, 1);
        assert_eq!(config.relay.backoff_cap_secs, 30);
    }
}
