use std::time::Duration;

use clap::Parser;
use eddn_hub::actors::hub::HubHandle;
use eddn_hub::actors::sampler::SamplerHandle;
use eddn_hub::actors::storage::StorageHandle;
use eddn_hub::api::{ApiState, spawn_api_server};
use eddn_hub::classifier;
use eddn_hub::config::{Config, StorageConfig, read_config_file};
use eddn_hub::monitoring::MonitorAggregator;
use eddn_hub::monitoring::alerts::AlertingHandle;
use eddn_hub::monitoring::errors::ErrorTrackerHandle;
use eddn_hub::monitoring::performance::PerformanceHandle;
use eddn_hub::relay::RelayClient;
use eddn_hub::storage::StorageBackend;
use eddn_hub::storage::memory::MemoryBackend;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON); defaults apply when omitted
    #[arg(short)]
    file: Option<String>,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("eddn_hub", LevelFilter::DEBUG),
        ("server", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

async fn build_backend(config: &StorageConfig) -> anyhow::Result<Box<dyn StorageBackend>> {
    match config {
        StorageConfig::None => {
            info!("running without persistence (in-memory storage)");
            Ok(Box::new(MemoryBackend::new()))
        }

        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let backend = eddn_hub::storage::sqlite::SqliteBackend::new(path).await?;
            Ok(Box::new(backend))
        }

        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("sqlite storage requested but the storage-sqlite feature is disabled")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => Config::default(),
    };

    let hub = HubHandle::spawn(Duration::from_secs(config.hub.heartbeat_interval_secs));
    let errors = ErrorTrackerHandle::spawn();

    let (record_tx, _) = broadcast::channel(1024);

    let backend = build_backend(&config.storage).await?;
    let storage = StorageHandle::spawn(backend, record_tx.subscribe(), errors.clone());

    let sampler = SamplerHandle::spawn(
        Duration::from_secs(config.sampler.interval_secs),
        record_tx.subscribe(),
        hub.clone(),
    );

    let performance = PerformanceHandle::spawn();
    let alerting = AlertingHandle::spawn(config.alerts.webhook_url.clone(), hub.clone());

    let mut alert_channels = vec!["log".to_string(), "websocket".to_string()];
    if config.alerts.webhook_url.is_some() {
        alert_channels.push("webhook".to_string());
    }

    let monitor = MonitorAggregator::new(
        hub.clone(),
        storage.clone(),
        sampler.clone(),
        errors.clone(),
        performance.clone(),
        alerting.clone(),
        alert_channels,
        config.alerts.error_rate_threshold(),
    );

    let (envelope_tx, envelope_rx) = mpsc::channel(1024);
    let classifier_task = classifier::spawn(envelope_rx, record_tx.clone(), hub.clone());

    // Without a relay the sender is held here so the classifier stays up
    let mut _idle_ingest_tx = None;
    match &config.relay.url {
        Some(url) => {
            RelayClient::new(url.clone(), &config.relay, envelope_tx).spawn();
        }
        None => {
            info!("no relay URL configured, ingestion idle");
            _idle_ingest_tx = Some(envelope_tx);
        }
    }

    let state = ApiState::new(hub.clone(), storage.clone(), sampler.clone(), monitor);

    // The one fatal startup error: failure to bind the listener
    spawn_api_server(&config.api, state).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    sampler.shutdown().await;
    alerting.shutdown().await;
    performance.shutdown().await;
    storage.shutdown().await;
    errors.shutdown().await;
    hub.shutdown().await;
    classifier_task.abort();

    Ok(())
}
