//! SubscriptionHub - connection registry and channel-filtered broadcast
//!
//! The hub is the single owner of all per-connection state. Every mutation
//! (new connections, subscription changes, broadcasts, liveness sweeps,
//! disconnects) goes through the actor's command loop, so registry edits are
//! serialized without locks.
//!
//! ## Liveness state machine
//!
//! ```text
//! sweep tick:
//!   alive == false  → close + deregister (missed a full interval)
//!   alive == true   → alive = false, send transport ping
//! pong received     → alive = true
//! ```
//!
//! The two-phase mark-then-check design tolerates one missed cycle but
//! evicts any connection silent for a full interval.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, instrument, trace, warn};

use super::messages::{ConnectionId, ConnectionMessage, Frame, HubCommand};

/// Per-connection state, owned exclusively by the hub.
struct Connection {
    sender: mpsc::UnboundedSender<ConnectionMessage>,
    subscriptions: HashSet<String>,
    alive: bool,
    last_pong_at: DateTime<Utc>,
}

/// Actor owning the connection registry.
pub struct SubscriptionHub {
    connections: HashMap<ConnectionId, Connection>,
    next_id: ConnectionId,
    command_rx: mpsc::Receiver<HubCommand>,
    heartbeat_interval: Duration,
}

impl SubscriptionHub {
    pub fn new(command_rx: mpsc::Receiver<HubCommand>, heartbeat_interval: Duration) -> Self {
        Self {
            connections: HashMap::new(),
            next_id: 1,
            command_rx,
            heartbeat_interval,
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting subscription hub");

        let mut sweep = interval(self.heartbeat_interval);
        // The first tick completes immediately; skip it so connections get a
        // full interval before their first liveness check.
        sweep.tick().await;

        loop {
            tokio::select! {
                _ = sweep.tick() => {
                    self.sweep();
                }

                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        warn!("command channel closed, shutting down");
                        break;
                    };

                    if !self.handle_command(cmd) {
                        break;
                    }
                }
            }
        }

        for (_, conn) in self.connections.drain() {
            let _ = conn.sender.send(ConnectionMessage::Close);
        }

        debug!("subscription hub stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle_command(&mut self, cmd: HubCommand) -> bool {
        match cmd {
            HubCommand::Register { sender, respond_to } => {
                let id = self.register(sender);
                let _ = respond_to.send(id);
            }

            HubCommand::Subscribe {
                id,
                channel,
                respond_to,
            } => {
                let _ = respond_to.send(self.subscribe(id, channel));
            }

            HubCommand::Unsubscribe {
                id,
                channel,
                respond_to,
            } => {
                let _ = respond_to.send(self.unsubscribe(id, &channel));
            }

            HubCommand::Pong { id } => {
                if let Some(conn) = self.connections.get_mut(&id) {
                    conn.alive = true;
                    conn.last_pong_at = Utc::now();
                }
            }

            HubCommand::Broadcast { frame, channel } => {
                self.broadcast(&frame, channel.as_deref());
            }

            HubCommand::Disconnect { id } => {
                if self.connections.remove(&id).is_some() {
                    debug!("connection {id} deregistered");
                }
            }

            HubCommand::ConnectionCount { respond_to } => {
                let _ = respond_to.send(self.connections.len());
            }

            HubCommand::Shutdown => {
                debug!("received shutdown command");
                return false;
            }
        }

        true
    }

    fn register(&mut self, sender: mpsc::UnboundedSender<ConnectionMessage>) -> ConnectionId {
        let id = self.next_id;
        self.next_id += 1;

        let welcome = Frame::new(
            "welcome",
            serde_json::json!({ "message": "Connected to EDDN mining data hub" }),
        );
        if let Ok(text) = serde_json::to_string(&welcome) {
            let _ = sender.send(ConnectionMessage::Text(text));
        }

        self.connections.insert(
            id,
            Connection {
                sender,
                subscriptions: HashSet::new(),
                alive: true,
                last_pong_at: Utc::now(),
            },
        );

        debug!("connection {id} registered");
        id
    }

    fn subscribe(&mut self, id: ConnectionId, channel: String) -> bool {
        let Some(conn) = self.connections.get_mut(&id) else {
            trace!("subscribe for unknown connection {id}, ignoring");
            return false;
        };

        let frame = Frame::new("subscribed", serde_json::json!({ "channel": channel }));
        conn.subscriptions.insert(channel);
        if let Ok(text) = serde_json::to_string(&frame) {
            let _ = conn.sender.send(ConnectionMessage::Text(text));
        }
        true
    }

    fn unsubscribe(&mut self, id: ConnectionId, channel: &str) -> bool {
        let Some(conn) = self.connections.get_mut(&id) else {
            trace!("unsubscribe for unknown connection {id}, ignoring");
            return false;
        };

        conn.subscriptions.remove(channel);
        let frame = Frame::new("unsubscribed", serde_json::json!({ "channel": channel }));
        if let Ok(text) = serde_json::to_string(&frame) {
            let _ = conn.sender.send(ConnectionMessage::Text(text));
        }
        true
    }

    /// Deliver a frame to matching connections, best-effort.
    ///
    /// The frame is serialized once. A failed send means the transport is
    /// gone; that connection is evicted without aborting delivery to others.
    fn broadcast(&mut self, frame: &Frame, channel: Option<&str>) {
        let text = match serde_json::to_string(frame) {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to serialize broadcast frame: {e}");
                return;
            }
        };

        let mut dead = Vec::new();

        for (id, conn) in &self.connections {
            if let Some(channel) = channel {
                if !conn.subscriptions.contains(channel) {
                    continue;
                }
            }

            if conn
                .sender
                .send(ConnectionMessage::Text(text.clone()))
                .is_err()
            {
                dead.push(*id);
            }
        }

        for id in dead {
            debug!("send failed for connection {id}, evicting");
            self.connections.remove(&id);
        }
    }

    /// Heartbeat sweep: evict connections that missed a full interval,
    /// mark the rest not-alive and ping them.
    fn sweep(&mut self) {
        let mut evicted = Vec::new();

        for (id, conn) in &mut self.connections {
            if !conn.alive {
                debug!(
                    "connection {id} silent since {}, terminating",
                    conn.last_pong_at
                );
                let _ = conn.sender.send(ConnectionMessage::Close);
                evicted.push(*id);
                continue;
            }

            conn.alive = false;
            if conn.sender.send(ConnectionMessage::Ping).is_err() {
                evicted.push(*id);
            }
        }

        for id in evicted {
            self.connections.remove(&id);
        }
    }
}

/// Handle for interacting with the SubscriptionHub
#[derive(Debug, Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Spawn a new hub actor with the given heartbeat interval.
    pub fn spawn(heartbeat_interval: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);

        let actor = SubscriptionHub::new(cmd_rx, heartbeat_interval);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Register a connection. `None` means the hub is gone.
    pub async fn register(
        &self,
        sender: mpsc::UnboundedSender<ConnectionMessage>,
    ) -> Option<ConnectionId> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(HubCommand::Register {
                sender,
                respond_to: tx,
            })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Subscribe a connection to a channel. `false` for unknown connections.
    pub async fn subscribe(&self, id: ConnectionId, channel: impl Into<String>) -> bool {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(HubCommand::Subscribe {
                id,
                channel: channel.into(),
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Remove a channel from a connection's subscription set.
    pub async fn unsubscribe(&self, id: ConnectionId, channel: impl Into<String>) -> bool {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(HubCommand::Unsubscribe {
                id,
                channel: channel.into(),
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Record a transport pong for a connection.
    pub async fn pong(&self, id: ConnectionId) {
        let _ = self.sender.send(HubCommand::Pong { id }).await;
    }

    /// Broadcast a frame, optionally filtered to one channel's subscribers.
    pub async fn broadcast(&self, frame: Frame, channel: Option<String>) {
        let _ = self
            .sender
            .send(HubCommand::Broadcast { frame, channel })
            .await;
    }

    /// Deregister a connection.
    pub async fn disconnect(&self, id: ConnectionId) {
        let _ = self.sender.send(HubCommand::Disconnect { id }).await;
    }

    /// Number of registered connections. `None` means the hub is unreachable.
    pub async fn connection_count(&self) -> Option<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(HubCommand::ConnectionCount { respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Shutdown the hub
    pub async fn shutdown(&self) {
        let _ = self.sender.send(HubCommand::Shutdown).await;
    }
}
