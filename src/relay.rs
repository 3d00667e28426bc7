//! Upstream relay client
//!
//! Maintains a WebSocket connection to the upstream data relay and feeds
//! raw envelopes into the classifier. The connection is retried forever
//! with capped exponential backoff; a relay outage is never fatal, it only
//! pauses ingestion.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::RelayEnvelope;
use crate::config::RelayConfig;

/// Client for the upstream relay feed
pub struct RelayClient {
    url: String,
    backoff_base: Duration,
    backoff_cap: Duration,
    envelope_tx: mpsc::Sender<RelayEnvelope>,
}

impl RelayClient {
    pub fn new(url: String, config: &RelayConfig, envelope_tx: mpsc::Sender<RelayEnvelope>) -> Self {
        Self {
            url,
            backoff_base: Duration::from_secs(config.backoff_base_secs),
            backoff_cap: Duration::from_secs(config.backoff_cap_secs),
            envelope_tx,
        }
    }

    /// Spawn the relay connection loop.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Connect-and-read loop with capped exponential backoff. Each
    /// successful session resets the backoff.
    pub async fn run(self) {
        let mut backoff = self.backoff_base;

        loop {
            info!("connecting to relay: {}", self.url);

            match self.connect_once().await {
                Ok(_) => {
                    info!("relay disconnected, reconnecting in {backoff:?}");
                    backoff = self.backoff_base;
                }
                Err(e) => {
                    warn!("relay connection error: {e:#}, reconnecting in {backoff:?}");
                }
            }

            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(self.backoff_cap);

            if self.envelope_tx.is_closed() {
                debug!("classifier gone, stopping relay client");
                break;
            }
        }
    }

    async fn connect_once(&self) -> Result<()> {
        let (ws_stream, _) = connect_async(&self.url)
            .await
            .with_context(|| format!("failed to connect to relay at {}", self.url))?;

        info!("relay connected");

        let (_write, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            let msg = msg.context("relay message error")?;

            match msg {
                Message::Text(text) => match serde_json::from_str::<RelayEnvelope>(&text) {
                    Ok(envelope) => {
                        if self.envelope_tx.send(envelope).await.is_err() {
                            debug!("classifier gone, closing relay connection");
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        // Relay schema space is large; unparseable frames
                        // are dropped, not escalated
                        debug!("unparseable relay frame: {e}");
                    }
                },

                Message::Close(_) => {
                    info!("relay closed the connection");
                    break;
                }

                Message::Ping(_) | Message::Pong(_) => {}

                _ => {}
            }
        }

        Ok(())
    }
}
