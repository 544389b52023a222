//! Frame handling of the WebSocket connector against a local tungstenite server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use strictly_online::{ConnectionState, HandlerError, ReconnectPolicy, Transport};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Serves every connection with `frames`, then holds it open until the client leaves.
async fn serve(frames: Vec<Message>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let accepts = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&accepts);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let frames = frames.clone();
            tokio::spawn(async move {
                let mut ws = accept_async(stream).await.unwrap();
                for frame in frames {
                    if ws.send(frame).await.is_err() {
                        return;
                    }
                }
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    (url, accepts)
}

fn recording_transport(url: String) -> (Transport, mpsc::UnboundedReceiver<Value>) {
    let transport = Transport::websocket(url, ReconnectPolicy::default());
    let (tx, rx) = mpsc::unbounded_channel();
    transport.registry().subscribe(
        "PING",
        Arc::new(move |payload: &Value| -> Result<(), HandlerError> {
            let _ = tx.send(payload.clone());
            Ok(())
        }),
    );
    (transport, rx)
}

async fn next_ping(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no PING delivered")
        .expect("handler dropped")
}

#[tokio::test]
async fn test_non_utf8_binary_frame_keeps_connection() {
    let (url, accepts) = serve(vec![
        Message::Binary(vec![0xff, 0xfe, 0xfd].into()),
        Message::Binary(r#"{"type":"PING","payload":1}"#.as_bytes().to_vec().into()),
        Message::Text(r#"{"type":"PING","payload":2}"#.into()),
    ])
    .await;
    let (mut transport, mut pings) = recording_transport(url);

    transport.connect("tok").await.unwrap();

    assert_eq!(next_ping(&mut pings).await, json!(1));
    assert_eq!(next_ping(&mut pings).await, json!(2));
    assert_eq!(transport.state(), ConnectionState::Connected);
    assert_eq!(transport.reconnect_attempts(), 0);
    assert_eq!(accepts.load(Ordering::SeqCst), 1, "no redial");

    transport.disconnect().await;
}

#[tokio::test]
async fn test_malformed_text_frame_keeps_connection() {
    let (url, accepts) = serve(vec![
        Message::Text("{not json".into()),
        Message::Text(r#"{"type":"PING","payload":3}"#.into()),
    ])
    .await;
    let (mut transport, mut pings) = recording_transport(url);

    transport.connect("tok").await.unwrap();

    assert_eq!(next_ping(&mut pings).await, json!(3));
    assert_eq!(transport.state(), ConnectionState::Connected);
    assert_eq!(accepts.load(Ordering::SeqCst), 1);

    transport.disconnect().await;
}
