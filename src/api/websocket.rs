//! WebSocket transport for live subscribers
//!
//! Bridges one axum WebSocket to the subscription hub: outbound frames
//! flow from the hub through an unbounded channel to the socket writer,
//! inbound text frames are parsed as control frames and translated into
//! hub commands. Malformed input is answered with an error frame to this
//! client only.

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::actors::messages::{ConnectionMessage, ControlFrame, Frame};
use crate::api::state::ApiState;

/// WebSocket upgrade handler
///
/// GET /api/stream
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

fn error_frame(tx: &mpsc::UnboundedSender<ConnectionMessage>, message: &str) {
    let frame = Frame::new("error", serde_json::json!({ "message": message }));
    if let Ok(text) = serde_json::to_string(&frame) {
        let _ = tx.send(ConnectionMessage::Text(text));
    }
}

fn pong_frame(tx: &mpsc::UnboundedSender<ConnectionMessage>) {
    let frame = Frame::new("pong", serde_json::json!({}));
    if let Ok(text) = serde_json::to_string(&frame) {
        let _ = tx.send(ConnectionMessage::Text(text));
    }
}

async fn handle_websocket(socket: WebSocket, state: ApiState) {
    let (hub_tx, mut hub_rx) = mpsc::unbounded_channel();

    let Some(id) = state.hub.register(hub_tx.clone()).await else {
        debug!("hub unavailable, dropping WebSocket connection");
        return;
    };

    info!("WebSocket client connected as connection {id}");

    let (mut sender, mut receiver) = socket.split();

    // Writer: drain hub messages to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = hub_rx.recv().await {
            match msg {
                ConnectionMessage::Text(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                ConnectionMessage::Ping => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
                ConnectionMessage::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Reader: translate client frames into hub commands
    let hub = state.hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ControlFrame>(&text) {
                    Ok(ControlFrame::Subscribe { channel }) => {
                        let Some(channel) = channel else {
                            error_frame(&hub_tx, "subscribe requires a channel");
                            continue;
                        };
                        hub.subscribe(id, channel).await;
                    }

                    Ok(ControlFrame::Unsubscribe { channel }) => {
                        let Some(channel) = channel else {
                            error_frame(&hub_tx, "unsubscribe requires a channel");
                            continue;
                        };
                        hub.unsubscribe(id, channel).await;
                    }

                    Ok(ControlFrame::Ping) => {
                        hub.pong(id).await;
                        pong_frame(&hub_tx);
                    }

                    Err(_) => {
                        error_frame(&hub_tx, "unrecognized message");
                    }
                },

                Message::Pong(_) => {
                    hub.pong(id).await;
                }

                Message::Close(_) => break,

                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    state.hub.disconnect(id).await;
    info!("WebSocket connection {id} closed");
}
