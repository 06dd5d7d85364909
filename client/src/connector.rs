use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use tungstenite::Message;

use shared::types::notification::{ClientCommand, NotificationMessage, NotificationPayload};

use crate::events::NotificationHandler;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Fallback endpoint when `BEELINK_WS_URL` is unset.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:1337/ws";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Clone, Debug)]
pub struct ConnectorConfig {
    pub endpoint: String,
    pub store_id: String,
    /// Flat delay between reconnect attempts. Flat rather than exponential,
    /// matching the dashboard's original policy; a merchant tab sitting on
    /// a flaky connection recovers within one delay of the network's return.
    pub reconnect_delay: Duration,
    /// Consecutive failures tolerated before giving up, so a permanently
    /// dead endpoint does not retry forever. Resets after any successful
    /// handshake.
    pub max_reconnect_attempts: u32,
}

impl ConnectorConfig {
    /// Defaults: endpoint from `BEELINK_WS_URL` (or the local fallback),
    /// 3s flat reconnect delay, 10 attempts.
    pub fn new(store_id: &str) -> Self {
        Self {
            endpoint: endpoint_from_env(),
            store_id: store_id.to_string(),
            reconnect_delay: Duration::from_secs(3),
            max_reconnect_attempts: 10,
        }
    }
}

fn endpoint_from_env() -> String {
    std::env::var("BEELINK_WS_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string())
}

// ---------------------------------------------------------------------------
// StoreConnector
// ---------------------------------------------------------------------------

/// Maintains one live subscription to a store's notification topic.
///
/// State machine `Disconnected → Connecting → Connected`, observable via
/// [`watch_state`]. Any non-local drop schedules a reconnect; on every
/// successful handshake the connector re-issues `subscribe_store` for its
/// configured store. Calling [`disconnect`] is the only path that suppresses
/// the retry — it also cancels a reconnect timer already in flight.
///
/// [`watch_state`]: StoreConnector::watch_state
/// [`disconnect`]: StoreConnector::disconnect
pub struct StoreConnector {
    config: ConnectorConfig,
    handler: Arc<dyn NotificationHandler>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    commands: Mutex<Option<mpsc::UnboundedSender<ClientCommand>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StoreConnector {
    pub fn new(config: ConnectorConfig, handler: Arc<dyn NotificationHandler>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            handler,
            state_tx,
            shutdown_tx,
            commands: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Start the connection loop. No-op if it is already running.
    pub fn connect(&self) {
        let Ok(mut task) = self.task.lock() else {
            return;
        };
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            debug!("connect() ignored: already running");
            return;
        }

        self.shutdown_tx.send_replace(false);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        if let Ok(mut commands) = self.commands.lock() {
            *commands = Some(cmd_tx);
        }

        let handle = tokio::spawn(run_loop(
            self.config.clone(),
            Arc::clone(&self.handler),
            self.state_tx.clone(),
            self.shutdown_tx.subscribe(),
            cmd_rx,
        ));
        *task = Some(handle);
    }

    /// Tear down and stay down: cancels the reconnect timer, closes the
    /// transport, and leaves the state at `Disconnected`.
    pub fn disconnect(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Application-level liveness probe; the hub answers with `pong`
    /// (see [`NotificationHandler::on_pong`]). Dropped when not connected.
    pub fn ping(&self) {
        self.send_command(ClientCommand::Ping);
    }

    /// Watch an additional store on this connection. Extra subscriptions
    /// are not replayed on reconnect — only the configured store is.
    pub fn subscribe_store(&self, store_id: &str) {
        self.send_command(ClientCommand::SubscribeStore {
            store_id: store_id.to_string(),
        });
    }

    pub fn unsubscribe_store(&self, store_id: &str) {
        self.send_command(ClientCommand::UnsubscribeStore {
            store_id: store_id.to_string(),
        });
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn send_command(&self, command: ClientCommand) {
        if !self.is_connected() {
            debug!("Dropping {:?}: not connected", command);
            return;
        }
        if let Ok(commands) = self.commands.lock() {
            if let Some(tx) = commands.as_ref() {
                let _ = tx.send(command);
            }
        }
    }
}

impl Drop for StoreConnector {
    // The run loop and its pending reconnect timer must not outlive the
    // owning dashboard component.
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

async fn run_loop(
    config: ConnectorConfig,
    handler: Arc<dyn NotificationHandler>,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: watch::Receiver<bool>,
    mut commands: mpsc::UnboundedReceiver<ClientCommand>,
) {
    let mut failures: u32 = 0;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        set_state(&state_tx, &handler, ConnectionState::Connecting);

        let mut local_end = false;
        match connect_async(config.endpoint.as_str()).await {
            Err(e) => {
                warn!("Handshake with {} failed: {}", config.endpoint, e);
                handler.on_error(&e.to_string());
            }
            Ok((mut ws, _response)) => {
                info!("Connected to {}", config.endpoint);
                let subscribe = ClientCommand::SubscribeStore {
                    store_id: config.store_id.clone(),
                };
                if ws.send(Message::Text(subscribe.to_json())).await.is_ok() {
                    failures = 0;
                    set_state(&state_tx, &handler, ConnectionState::Connected);
                    local_end =
                        session(&mut ws, &handler, &mut shutdown_rx, &mut commands).await;
                    let _ = ws.close(None).await;
                } else {
                    handler.on_error("failed to send subscribe command");
                }
            }
        }

        set_state(&state_tx, &handler, ConnectionState::Disconnected);

        if local_end || *shutdown_rx.borrow() {
            debug!("Local disconnect, suppressing reconnect");
            break;
        }

        failures += 1;
        if failures > config.max_reconnect_attempts {
            warn!(
                "Giving up after {} reconnect attempts",
                config.max_reconnect_attempts
            );
            handler.on_error("reconnect attempts exhausted");
            break;
        }

        debug!(
            "Reconnecting in {:?} (attempt {}/{})",
            config.reconnect_delay, failures, config.max_reconnect_attempts
        );
        // The shutdown watch doubles as the cancellable reconnect timer.
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown_rx.changed() => {}
        }
    }

    set_state(&state_tx, &handler, ConnectionState::Disconnected);
}

/// Drive one live session. Returns true when the session ended locally
/// (explicit disconnect or the owning connector went away) — the caller
/// must not reconnect in that case.
async fn session(
    ws: &mut Socket,
    handler: &Arc<dyn NotificationHandler>,
    shutdown_rx: &mut watch::Receiver<bool>,
    commands: &mut mpsc::UnboundedReceiver<ClientCommand>,
) -> bool {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return true;
                }
            }
            cmd = commands.recv() => match cmd {
                Some(cmd) => {
                    if ws.send(Message::Text(cmd.to_json())).await.is_err() {
                        return false;
                    }
                }
                // Connector dropped: treat as a local teardown.
                None => return true,
            },
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => dispatch_frame(&text, handler),
                Some(Ok(Message::Close(_))) | None => return false,
                // Protocol-level heartbeats are answered by tungstenite.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    handler.on_error(&e.to_string());
                    return false;
                }
            }
        }
    }
}

fn dispatch_frame(text: &str, handler: &Arc<dyn NotificationHandler>) {
    let msg: NotificationMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("Ignoring malformed frame: {}", e);
            return;
        }
    };

    match msg.payload {
        NotificationPayload::NewOrder(order) => handler.on_new_order(order),
        NotificationPayload::OrderUpdate(order) => handler.on_order_update(order),
        NotificationPayload::OrderDelete { id } => handler.on_order_delete(id),
        NotificationPayload::PendingOrdersCount { count } => handler.on_pending_orders_count(count),
        NotificationPayload::Notification(data) => handler.on_notification(data),
        NotificationPayload::Pong => handler.on_pong(),
        // The hub never pings at the application level.
        NotificationPayload::Ping => {}
    }
}

fn set_state(
    state_tx: &watch::Sender<ConnectionState>,
    handler: &Arc<dyn NotificationHandler>,
    state: ConnectionState,
) {
    let changed = state_tx.send_if_modified(|current| {
        if *current == state {
            false
        } else {
            *current = state;
            true
        }
    });
    if changed {
        handler.on_state_change(state);
    }
}
