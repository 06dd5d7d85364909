use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use http_body_util::{BodyExt, Empty};
use hyper::header::{CONNECTION, HeaderValue, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, UPGRADE};
use hyper::upgrade::Upgraded;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};
use tungstenite::Message;
use tungstenite::handshake::derive_accept_key;
use tungstenite::protocol::Role;
use uuid::Uuid;

use shared::types::notification::{ClientCommand, NotificationMessage, NotificationPayload};

use crate::AppState;
use crate::handlers::json_response::{JsonResponse, json_error};

type Socket = WebSocketStream<TokioIo<Upgraded>>;

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Check if a request asks for a WebSocket upgrade
pub fn is_upgrade_request(req: &Request<hyper::body::Incoming>) -> bool {
    req.headers()
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

/// Upgrade `GET /ws` to a WebSocket and hand the connection to the hub.
///
/// An optional `userId` query parameter (injected by the surrounding auth
/// layer) binds the connection to a user channel for direct delivery.
pub async fn handle_ws_upgrade(
    mut req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<JsonResponse> {
    if !is_upgrade_request(&req) {
        return json_error(
            "UPGRADE_REQUIRED",
            "Expected a WebSocket upgrade request",
            StatusCode::BAD_REQUEST,
        );
    }

    let Some(key) = req
        .headers()
        .get(SEC_WEBSOCKET_KEY)
        .map(|k| derive_accept_key(k.as_bytes()))
    else {
        return json_error(
            "BAD_HANDSHAKE",
            "Missing Sec-WebSocket-Key header",
            StatusCode::BAD_REQUEST,
        );
    };

    // Connection cap: shed load before accepting the socket.
    let stats = state.manager.get_stats().await;
    if stats.total_connections >= state.config.server.max_connections {
        warn!(
            "Rejecting upgrade: connection limit reached ({})",
            state.config.server.max_connections
        );
        return json_error(
            "TOO_MANY_CONNECTIONS",
            "Connection limit reached",
            StatusCode::SERVICE_UNAVAILABLE,
        );
    }

    let mut params = parse_query(&req);
    let user_id = params.remove("userId").or_else(|| params.remove("user_id"));

    tokio::task::spawn(async move {
        match hyper::upgrade::on(&mut req).await {
            Ok(upgraded) => {
                let io = TokioIo::new(upgraded);
                let ws = WebSocketStream::from_raw_socket(io, Role::Server, None).await;
                run_connection(ws, state, user_id).await;
            }
            Err(e) => warn!("Upgrade error: {}", e),
        }
    });

    let response = hyper::Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(CONNECTION, HeaderValue::from_static("Upgrade"))
        .header(UPGRADE, HeaderValue::from_static("websocket"))
        .header(SEC_WEBSOCKET_ACCEPT, key)
        .body(Empty::<Bytes>::new().boxed())?;

    Ok(response)
}

fn parse_query(req: &Request<hyper::body::Incoming>) -> HashMap<String, String> {
    form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
        .into_owned()
        .collect()
}

// ---------------------------------------------------------------------------
// Connection lifecycle
// ---------------------------------------------------------------------------

/// Own one upgraded socket until it closes.
///
/// The writer task drains the outbound queue and heartbeats; the read loop
/// handles inbound commands. Whatever ends the session, the manager's
/// `disconnect` runs exactly once and purges every membership.
async fn run_connection(ws: Socket, state: AppState, user_id: Option<String>) {
    let connection_id = Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::unbounded_channel();
    state
        .manager
        .register_connection(&connection_id, tx, user_id.as_deref())
        .await;

    let (sink, mut stream) = ws.split();
    let heartbeat = Duration::from_secs(state.manager.heartbeat_secs());
    let writer = tokio::task::spawn(write_loop(sink, rx, heartbeat, connection_id.clone()));

    let reason = read_loop(&mut stream, &connection_id, &state).await;

    // Dropping the registered sender ends the writer's recv loop.
    state.manager.disconnect(&connection_id, &reason).await;
    let _ = writer.await;
    info!("Connection task finished: {}", connection_id);
}

/// Drain queued frames to the peer; send a protocol Ping every `heartbeat`
/// to surface half-open connections. Ends when the queue closes (disconnect)
/// or a write fails.
async fn write_loop(
    mut sink: SplitSink<Socket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    heartbeat: Duration,
    connection_id: String,
) {
    let start = tokio::time::Instant::now() + heartbeat;
    let mut ticker = tokio::time::interval_at(start, heartbeat);

    loop {
        tokio::select! {
            queued = rx.recv() => match queued {
                Some(frame) => {
                    if let Err(e) = sink.send(frame).await {
                        debug!("Write failed for {}: {}", connection_id, e);
                        break;
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                    debug!("Heartbeat failed for {}: {}", connection_id, e);
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}

/// Consume inbound frames until the peer goes away; returns the close reason.
async fn read_loop(
    stream: &mut SplitStream<Socket>,
    connection_id: &str,
    state: &AppState,
) -> String {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_command(&text, connection_id, state).await,
            Ok(Message::Close(_)) => return "client close".to_string(),
            // Protocol-level pings are answered by tungstenite itself.
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(other) => debug!(
                "Ignoring non-text frame from {} ({} bytes)",
                connection_id,
                other.len()
            ),
            Err(e) => return format!("transport error: {}", e),
        }
    }
    "transport close".to_string()
}

/// One inbound command. Malformed frames are logged and dropped — a broken
/// client must never take the hub down.
async fn handle_command(text: &str, connection_id: &str, state: &AppState) {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(ClientCommand::SubscribeStore { store_id }) => {
            state.manager.subscribe_store(&store_id, connection_id).await;
        }
        Ok(ClientCommand::UnsubscribeStore { store_id }) => {
            state
                .manager
                .unsubscribe_store(&store_id, connection_id)
                .await;
        }
        Ok(ClientCommand::Ping) => {
            let pong = NotificationMessage::new(NotificationPayload::Pong);
            state.manager.send_to_connection(connection_id, &pong).await;
        }
        Err(e) => debug!("Ignoring malformed frame from {}: {}", connection_id, e),
    }
}
