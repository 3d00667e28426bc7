//! Subscription and liveness tests over the real WebSocket transport

use std::time::Duration;

use eddn_hub::actors::messages::Frame;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::helpers::spawn_stack;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(addr: std::net::SocketAddr) -> WsStream {
    let (stream, _) = connect_async(format!("ws://{addr}/api/stream"))
        .await
        .expect("WebSocket connect");
    stream
}

/// Read frames until one of the given kind arrives or the timeout hits.
async fn wait_for_frame(stream: &mut WsStream, kind: &str) -> Frame {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let msg = tokio::time::timeout_at(deadline, stream.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("transport error");

        if let Message::Text(text) = msg {
            let frame: Frame = serde_json::from_str(&text).unwrap();
            if frame.kind == kind {
                return frame;
            }
        }
    }
}

#[tokio::test]
async fn connect_subscribe_and_receive_acknowledgments() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = crate::helpers::spawn_test_api(&stack).await;

    let mut ws = connect(addr).await;

    let welcome = wait_for_frame(&mut ws, "welcome").await;
    assert!(welcome.payload["message"].is_string());

    ws.send(Message::Text(
        r#"{ "type": "subscribe", "channel": "mining" }"#.to_string(),
    ))
    .await
    .unwrap();

    let subscribed = wait_for_frame(&mut ws, "subscribed").await;
    assert_eq!(subscribed.payload["channel"], "mining");

    ws.send(Message::Text(
        r#"{ "type": "unsubscribe", "channel": "mining" }"#.to_string(),
    ))
    .await
    .unwrap();

    let unsubscribed = wait_for_frame(&mut ws, "unsubscribed").await;
    assert_eq!(unsubscribed.payload["channel"], "mining");
}

#[tokio::test]
async fn application_ping_is_answered_with_pong() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = crate::helpers::spawn_test_api(&stack).await;

    let mut ws = connect(addr).await;
    wait_for_frame(&mut ws, "welcome").await;

    ws.send(Message::Text(r#"{ "type": "ping" }"#.to_string()))
        .await
        .unwrap();

    wait_for_frame(&mut ws, "pong").await;
}

#[tokio::test]
async fn malformed_frame_gets_error_reply_without_affecting_others() {
    let stack = spawn_stack(Duration::from_secs(60), None);
    let addr = crate::helpers::spawn_test_api(&stack).await;

    let mut bad = connect(addr).await;
    let mut good = connect(addr).await;
    wait_for_frame(&mut bad, "welcome").await;
    wait_for_frame(&mut good, "welcome").await;

    bad.send(Message::Text("this is not json".to_string()))
        .await
        .unwrap();
    bad.send(Message::Text(r#"{ "type": "subscribe" }"#.to_string()))
        .await
        .unwrap();

    let error = wait_for_frame(&mut bad, "error").await;
    assert!(error.payload["message"].is_string());

    // The well-behaved client still works
    good.send(Message::Text(
        r#"{ "type": "subscribe", "channel": "commodities" }"#.to_string(),
    ))
    .await
    .unwrap();
    wait_for_frame(&mut good, "subscribed").await;

    assert_eq!(stack.hub.connection_count().await, Some(2));
}

#[tokio::test]
async fn silent_client_is_evicted_while_responsive_client_survives() {
    // Short heartbeat so the test observes two sweeps quickly
    let stack = spawn_stack(Duration::from_millis(150), None);
    let addr = crate::helpers::spawn_test_api(&stack).await;

    let mut responsive = connect(addr).await;
    let _silent = connect(addr).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(stack.hub.connection_count().await, Some(2));

    // Reading the stream lets the client library answer transport pings;
    // the silent connection never reads and never pongs.
    let read_task = tokio::spawn(async move {
        while let Some(Ok(_)) = responsive.next().await {}
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(stack.hub.connection_count().await, Some(1));

    read_task.abort();
}
