// Integration tests for the duplex channel against a real local WebSocket
// server: subscription replay, heartbeat, close-code handling, reconnect
// suppression, and the best-effort send contract.

use driftwire::{
    config::DuplexChannelConfig,
    duplex::DuplexClient,
    events::create_event_bus,
    state::ChannelPhase,
    types::{ClientCommand, Topic},
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::{
    WebSocketStream, accept_async,
    tungstenite::Message,
    tungstenite::protocol::{CloseFrame, frame::coding::CloseCode},
};
use url::Url;

type ServerWs = WebSocketStream<TcpStream>;

/// Accept loop handing upgraded sockets to the test body and counting every
/// TCP accept, reconnects included.
async fn ws_server() -> (
    SocketAddr,
    mpsc::UnboundedReceiver<ServerWs>,
    Arc<AtomicUsize>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let accepts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepts);

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            if let Ok(ws) = accept_async(stream).await
                && tx.send(ws).is_err()
            {
                break;
            }
        }
    });

    (addr, rx, accepts)
}

fn config(addr: SocketAddr) -> DuplexChannelConfig {
    DuplexChannelConfig {
        url: Url::parse(&format!("ws://{addr}")).unwrap(),
        auto_connect: true,
        reconnect_attempts: 5,
        reconnect_delay: Duration::from_millis(50),
        heartbeat_interval: Duration::from_secs(30),
    }
}

async fn next_conn(conns: &mut mpsc::UnboundedReceiver<ServerWs>) -> ServerWs {
    timeout(Duration::from_secs(2), conns.recv())
        .await
        .expect("timed out waiting for a connection")
        .expect("accept loop ended")
}

async fn next_json(ws: &mut ServerWs) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket ended")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("client sent invalid JSON");
        }
    }
}

/// Poll a condition until it holds or the deadline passes.
async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn replays_subscriptions_after_abnormal_close() {
    let (addr, mut conns, _) = ws_server().await;
    let client = DuplexClient::spawn(config(addr), create_event_bus());

    let mut first = next_conn(&mut conns).await;
    let baseline = next_json(&mut first).await;
    assert_eq!(baseline["type"], "subscribe");
    assert_eq!(baseline["topic"], "all");

    client.subscribe(Topic::Drifts);
    client.subscribe(Topic::Stats);
    let a = next_json(&mut first).await;
    let b = next_json(&mut first).await;
    let mut requested: Vec<String> = vec![a, b]
        .iter()
        .map(|m| m["topic"].as_str().unwrap().to_string())
        .collect();
    requested.sort();
    assert_eq!(requested, vec!["drifts", "stats"]);

    // Tear the TCP connection down without a close frame: abnormal closure.
    drop(first);

    let mut second = next_conn(&mut conns).await;
    let mut replayed = Vec::new();
    for _ in 0..3 {
        let message = next_json(&mut second).await;
        assert_eq!(message["type"], "subscribe");
        replayed.push(message["topic"].as_str().unwrap().to_string());
    }
    // Baseline first; caller topics in any order.
    assert_eq!(replayed[0], "all");
    let mut rest = replayed[1..].to_vec();
    rest.sort();
    assert_eq!(rest, vec!["drifts", "stats"]);

    wait_until("client to report connected", || client.is_connected()).await;
}

#[tokio::test]
async fn heartbeat_pings_while_open_then_stops_on_disconnect() {
    let (addr, mut conns, accepts) = ws_server().await;
    let mut cfg = config(addr);
    cfg.heartbeat_interval = Duration::from_millis(100);
    let client = DuplexClient::spawn(cfg, create_event_bus());

    let mut conn = next_conn(&mut conns).await;
    let opened = Instant::now();
    let baseline = next_json(&mut conn).await;
    assert_eq!(baseline["topic"], "all");

    // First ping lands one full interval after the open, not immediately.
    let ping = next_json(&mut conn).await;
    assert_eq!(ping["type"], "ping");
    assert!(opened.elapsed() >= Duration::from_millis(80));

    let ping = next_json(&mut conn).await;
    assert_eq!(ping["type"], "ping");

    client.disconnect();

    // The client announces intent with the normal-closure code.
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        assert!(Instant::now() < deadline, "no close frame before teardown");
        match conn.next().await {
            Some(Ok(Message::Close(Some(frame)))) => {
                assert_eq!(frame.code, CloseCode::Normal);
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => panic!("connection ended without a close frame"),
        }
    }

    // No reconnect and no further pings after the disconnect.
    sleep(Duration::from_millis(300)).await;
    assert_eq!(accepts.load(Ordering::SeqCst), 1);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn two_rapid_connects_open_exactly_one_socket() {
    let (addr, mut conns, accepts) = ws_server().await;
    let mut cfg = config(addr);
    cfg.auto_connect = false;
    let client = DuplexClient::spawn(cfg, create_event_bus());

    client.connect();
    client.connect();

    let _conn = next_conn(&mut conns).await;
    wait_until("client to report connected", || client.is_connected()).await;
    sleep(Duration::from_millis(250)).await;
    assert_eq!(accepts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn send_while_closed_is_dropped_but_subscriptions_are_kept() {
    let (addr, mut conns, accepts) = ws_server().await;
    let mut cfg = config(addr);
    cfg.auto_connect = false;
    let client = DuplexClient::spawn(cfg, create_event_bus());

    // Best-effort send: nothing to deliver to, nothing breaks.
    client.send(ClientCommand::query(json!({"window": "1h"})));
    // Subscription intent is registered for the next open.
    client.subscribe(Topic::State);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(accepts.load(Ordering::SeqCst), 0);
    assert!(!client.is_connected());

    client.connect();
    let mut conn = next_conn(&mut conns).await;
    let baseline = next_json(&mut conn).await;
    assert_eq!(baseline["topic"], "all");
    let replayed = next_json(&mut conn).await;
    assert_eq!(replayed["type"], "subscribe");
    assert_eq!(replayed["topic"], "state");
}

#[tokio::test]
async fn malformed_frames_are_dropped_without_breaking_the_channel() {
    let (addr, mut conns, _) = ws_server().await;
    let client = DuplexClient::spawn(config(addr), create_event_bus());

    let mut conn = next_conn(&mut conns).await;
    let _ = next_json(&mut conn).await; // baseline subscribe

    conn.send(Message::Text("{not json at all".into()))
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;
    assert!(client.is_connected());
    assert!(client.last_message().is_none());

    conn.send(Message::Text(
        json!({"type": "pong", "payload": {"ok": true}}).to_string().into(),
    ))
    .await
    .unwrap();
    wait_until("the valid message to land", || client.last_message().is_some()).await;
    assert_eq!(client.last_message().unwrap().kind, "pong");
    assert!(client.is_connected());
}

#[tokio::test]
async fn normal_server_close_does_not_reconnect() {
    let (addr, mut conns, accepts) = ws_server().await;
    let client = DuplexClient::spawn(config(addr), create_event_bus());

    let mut conn = next_conn(&mut conns).await;
    let _ = next_json(&mut conn).await;

    conn.send(Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "done".into(),
    })))
    .await
    .unwrap();

    wait_until("client to close", || {
        client.status().phase == ChannelPhase::Closed
    })
    .await;
    sleep(Duration::from_millis(300)).await;
    assert_eq!(accepts.load(Ordering::SeqCst), 1);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn abnormal_close_code_triggers_reconnect() {
    let (addr, mut conns, accepts) = ws_server().await;
    let client = DuplexClient::spawn(config(addr), create_event_bus());

    let mut conn = next_conn(&mut conns).await;
    let _ = next_json(&mut conn).await;

    conn.send(Message::Close(Some(CloseFrame {
        code: CloseCode::Error,
        reason: "backend crashed".into(),
    })))
    .await
    .unwrap();

    let mut second = next_conn(&mut conns).await;
    let baseline = next_json(&mut second).await;
    assert_eq!(baseline["topic"], "all");
    assert!(accepts.load(Ordering::SeqCst) >= 2);
    wait_until("client to recover", || client.is_connected()).await;
}

#[tokio::test]
async fn disconnect_cancels_a_pending_reconnect_and_is_idempotent() {
    let (addr, mut conns, accepts) = ws_server().await;
    let mut cfg = config(addr);
    cfg.reconnect_delay = Duration::from_millis(200);
    let client = DuplexClient::spawn(cfg, create_event_bus());

    let first = next_conn(&mut conns).await;
    wait_until("client to report connected", || client.is_connected()).await;

    // Abnormal closure parks the client in its backoff wait...
    drop(first);
    wait_until("client to notice the drop", || !client.is_connected()).await;

    // ...and a disconnect during that wait must cancel the timer.
    client.disconnect();
    client.disconnect();

    sleep(Duration::from_millis(500)).await;
    assert_eq!(accepts.load(Ordering::SeqCst), 1);

    let status = client.status();
    assert_eq!(status.phase, ChannelPhase::Closed);
    assert!(!status.is_connected());
    assert!(!status.is_connecting());
}
