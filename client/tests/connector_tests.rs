//! Connector behaviour against a scripted in-process hub.
//!
//! Each test binds an ephemeral listener, accepts WebSocket handshakes with
//! `tokio-tungstenite`, and scripts the server side of the conversation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tungstenite::Message;

use client::{ConnectionState, ConnectorConfig, NotificationHandler, StoreConnector};
use shared::types::notification::{
    ClientCommand, NotificationMessage, NotificationPayload, Order,
};

// ---------------------------------------------------------------------------
// Test scaffolding
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Recorder {
    orders: Mutex<Vec<Order>>,
    deletes: Mutex<Vec<String>>,
    counts: Mutex<Vec<u64>>,
    errors: Mutex<Vec<String>>,
    states: Mutex<Vec<ConnectionState>>,
    pongs: AtomicUsize,
}

impl NotificationHandler for Recorder {
    fn on_new_order(&self, order: Order) {
        self.orders.lock().unwrap().push(order);
    }
    fn on_order_delete(&self, order_id: String) {
        self.deletes.lock().unwrap().push(order_id);
    }
    fn on_pending_orders_count(&self, count: u64) {
        self.counts.lock().unwrap().push(count);
    }
    fn on_pong(&self) {
        self.pongs.fetch_add(1, Ordering::SeqCst);
    }
    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
    fn on_state_change(&self, state: ConnectionState) {
        self.states.lock().unwrap().push(state);
    }
}

fn config(addr: std::net::SocketAddr, store_id: &str) -> ConnectorConfig {
    ConnectorConfig {
        endpoint: format!("ws://{}", addr),
        store_id: store_id.to_string(),
        reconnect_delay: Duration::from_millis(100),
        max_reconnect_attempts: 5,
    }
}

async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.expect("accept");
    tokio_tungstenite::accept_async(stream).await.expect("ws handshake")
}

/// Read frames until the subscribe command arrives; returns its store id.
async fn expect_subscribe(ws: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        match ws.next().await.expect("stream open").expect("frame") {
            Message::Text(text) => {
                if let Ok(ClientCommand::SubscribeStore { store_id }) =
                    serde_json::from_str(&text)
                {
                    return store_id;
                }
            }
            _ => continue,
        }
    }
}

async fn wait_until(what: &str, check: impl Fn() -> bool) {
    let deadline = tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });
    deadline.await.unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscribes_and_receives_new_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let recorder = Arc::new(Recorder::default());
    let connector = StoreConnector::new(config(addr, "store1"), recorder.clone());
    connector.connect();

    let mut ws = accept_ws(&listener).await;
    assert_eq!(expect_subscribe(&mut ws).await, "store1");

    let msg = NotificationMessage::for_store(
        "store1",
        NotificationPayload::NewOrder(Order::new("o1", 42.0)),
    );
    ws.send(Message::Text(msg.to_json())).await.unwrap();

    wait_until("order callback", || !recorder.orders.lock().unwrap().is_empty()).await;
    let orders = recorder.orders.lock().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, "o1");
    assert_eq!(orders[0].total, 42.0);
    assert!(connector.is_connected());
}

#[tokio::test]
async fn reconnects_after_remote_drop_and_resubscribes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let recorder = Arc::new(Recorder::default());
    let connector = StoreConnector::new(config(addr, "store1"), recorder.clone());
    connector.connect();

    // First session: handshake, then the server drops the transport.
    let mut ws = accept_ws(&listener).await;
    expect_subscribe(&mut ws).await;
    drop(ws);

    // Second session arrives after the flat delay and re-issues subscribe.
    let mut ws = accept_ws(&listener).await;
    assert_eq!(expect_subscribe(&mut ws).await, "store1");

    wait_until("reconnected", || connector.is_connected()).await;

    let states = recorder.states.lock().unwrap().clone();
    let reconnect_path = [
        ConnectionState::Connected,
        ConnectionState::Disconnected,
        ConnectionState::Connecting,
        ConnectionState::Connected,
    ];
    assert!(
        states.windows(4).any(|w| w == reconnect_path.as_slice()),
        "expected a full reconnect cycle, got {states:?}"
    );
}

#[tokio::test]
async fn explicit_disconnect_suppresses_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let recorder = Arc::new(Recorder::default());
    let connector = StoreConnector::new(config(addr, "store1"), recorder.clone());
    connector.connect();

    let mut ws = accept_ws(&listener).await;
    expect_subscribe(&mut ws).await;
    wait_until("connected", || connector.is_connected()).await;

    connector.disconnect();
    wait_until("disconnected", || {
        connector.state() == ConnectionState::Disconnected
    })
    .await;

    // Well past the retry delay: no new handshake may arrive.
    let second = tokio::time::timeout(Duration::from_millis(400), listener.accept()).await;
    assert!(second.is_err(), "connector reconnected after explicit disconnect");
    assert_eq!(connector.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn handshake_failure_surfaces_error_and_gives_up() {
    // Bind then drop, so the port is (very likely) unoccupied.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let recorder = Arc::new(Recorder::default());
    let mut cfg = config(addr, "store1");
    cfg.reconnect_delay = Duration::from_millis(20);
    cfg.max_reconnect_attempts = 2;
    let connector = StoreConnector::new(cfg, recorder.clone());
    connector.connect();

    // 1 initial failure + 2 retries, then the exhaustion error.
    wait_until("retries exhausted", || {
        recorder
            .errors
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.contains("exhausted"))
    })
    .await;
    assert!(recorder.errors.lock().unwrap().len() >= 3);
    assert_eq!(connector.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn application_ping_gets_a_pong() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let recorder = Arc::new(Recorder::default());
    let connector = StoreConnector::new(config(addr, "store1"), recorder.clone());
    connector.connect();

    let mut ws = accept_ws(&listener).await;
    expect_subscribe(&mut ws).await;
    wait_until("connected", || connector.is_connected()).await;

    connector.ping();

    // The scripted hub answers the app-level ping with a pong envelope.
    loop {
        match ws.next().await.expect("stream open").expect("frame") {
            Message::Text(text) => {
                if matches!(
                    serde_json::from_str::<ClientCommand>(&text),
                    Ok(ClientCommand::Ping)
                ) {
                    let pong = NotificationMessage::new(NotificationPayload::Pong);
                    ws.send(Message::Text(pong.to_json())).await.unwrap();
                    break;
                }
            }
            _ => continue,
        }
    }

    wait_until("pong callback", || recorder.pongs.load(Ordering::SeqCst) == 1).await;
}

#[tokio::test]
async fn delete_and_pending_count_events_dispatch_to_typed_callbacks() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let recorder = Arc::new(Recorder::default());
    let connector = StoreConnector::new(config(addr, "store1"), recorder.clone());
    connector.connect();

    let mut ws = accept_ws(&listener).await;
    expect_subscribe(&mut ws).await;

    let delete = NotificationMessage::for_store(
        "store1",
        NotificationPayload::OrderDelete { id: "o9".into() },
    );
    let count = NotificationMessage::for_store(
        "store1",
        NotificationPayload::PendingOrdersCount { count: 3 },
    );
    ws.send(Message::Text(delete.to_json())).await.unwrap();
    ws.send(Message::Text(count.to_json())).await.unwrap();

    wait_until("both callbacks", || {
        !recorder.deletes.lock().unwrap().is_empty() && !recorder.counts.lock().unwrap().is_empty()
    })
    .await;
    assert_eq!(recorder.deletes.lock().unwrap()[0], "o9");
    assert_eq!(recorder.counts.lock().unwrap()[0], 3);
    drop(connector);
}
