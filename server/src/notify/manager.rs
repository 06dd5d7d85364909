use std::collections::HashMap;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};
use tungstenite::Message;

use shared::types::notification::{NotificationMessage, NotificationPayload, Order};
use shared::types::stats::WsStats;

use super::registry::ConnectionRegistry;

/// Outbound half of one live connection. Unbounded so `send` never blocks
/// the emitting handler; the writer task drains it.
pub type OutboundSender = mpsc::UnboundedSender<Message>;

// ---------------------------------------------------------------------------
// NotificationManager
// ---------------------------------------------------------------------------

/// The facade the rest of the application calls to push events to
/// subscribed dashboards.
///
/// Owns the [`ConnectionRegistry`] plus the connection id → outbound sender
/// map, both behind a single `RwLock`. Every critical section is await-free,
/// so a registry mutation can never interleave with another handler's
/// partial update.
///
/// Delivery is fire-and-forget: a send failure on one stale connection is
/// logged and the fan-out continues to the remaining subscribers. An emit
/// to a topic with no subscribers is a silent no-op — offline merchants
/// reconcile from the database on their next page load.
#[derive(Debug)]
pub struct NotificationManager {
    inner: RwLock<Inner>,
    heartbeat_secs: u64,
}

#[derive(Debug, Default)]
struct Inner {
    registry: ConnectionRegistry,
    senders: HashMap<String, OutboundSender>,
}

impl NotificationManager {
    pub fn new(heartbeat_secs: u64) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            heartbeat_secs,
        }
    }

    /// Interval between protocol-level pings the writer tasks send.
    pub fn heartbeat_secs(&self) -> u64 {
        self.heartbeat_secs
    }

    // ── Connection lifecycle ──────────────────────────────────────────────

    /// Wire up a freshly upgraded connection. `user_id` comes from the
    /// handshake query string when the surrounding auth layer supplies one,
    /// enabling direct-to-user delivery.
    pub async fn register_connection(
        &self,
        connection_id: &str,
        sender: OutboundSender,
        user_id: Option<&str>,
    ) {
        let mut inner = self.inner.write().await;
        inner.senders.insert(connection_id.to_string(), sender);
        if let Some(user_id) = user_id {
            inner.registry.add_user_connection(user_id, connection_id);
        }
        info!(
            "Connection registered: {} (user: {:?}, total: {})",
            connection_id,
            user_id,
            inner.senders.len()
        );
    }

    /// Tear down a connection: drop its sender and purge every topic and
    /// channel membership. Total — disconnecting an unknown id is a no-op.
    pub async fn disconnect(&self, connection_id: &str, reason: &str) {
        let mut inner = self.inner.write().await;
        inner.registry.remove_all_for_connection(connection_id);
        if inner.senders.remove(connection_id).is_some() {
            info!(
                "Connection closed: {} (reason: {}, remaining: {})",
                connection_id,
                reason,
                inner.senders.len()
            );
        }
    }

    // ── Subscriptions ─────────────────────────────────────────────────────

    pub async fn subscribe_store(&self, store_id: &str, connection_id: &str) {
        let mut inner = self.inner.write().await;
        inner.registry.add_store_connection(store_id, connection_id);
        debug!("Connection {} subscribed to store {}", connection_id, store_id);
    }

    pub async fn unsubscribe_store(&self, store_id: &str, connection_id: &str) {
        let mut inner = self.inner.write().await;
        inner
            .registry
            .remove_store_connection(store_id, connection_id);
        debug!(
            "Connection {} unsubscribed from store {}",
            connection_id, store_id
        );
    }

    // ── Emission ──────────────────────────────────────────────────────────

    /// Fan a message out to every subscriber of a store topic.
    /// Returns how many subscribers it was handed to.
    pub async fn emit_to_store(&self, store_id: &str, message: &NotificationMessage) -> usize {
        let inner = self.inner.read().await;
        let Some(subscribers) = inner.registry.store_subscribers(store_id) else {
            debug!(
                "No subscribers for store {}, dropping {}",
                store_id,
                message.payload.event_name()
            );
            return 0;
        };

        let frame = message.to_json();
        let mut delivered = 0;
        for connection_id in subscribers {
            if Self::send_frame(&inner, connection_id, &frame) {
                delivered += 1;
            }
        }
        info!(
            "Fanned {} out to {}/{} subscribers of store {}",
            message.payload.event_name(),
            delivered,
            subscribers.len(),
            store_id
        );
        delivered
    }

    /// Deliver a message to every connection of one user.
    pub async fn emit_to_user(&self, user_id: &str, message: &NotificationMessage) -> usize {
        let inner = self.inner.read().await;
        let Some(connections) = inner.registry.user_connections(user_id) else {
            debug!(
                "No connections for user {}, dropping {}",
                user_id,
                message.payload.event_name()
            );
            return 0;
        };

        let frame = message.to_json();
        let mut delivered = 0;
        for connection_id in connections {
            if Self::send_frame(&inner, connection_id, &frame) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Broadcast to every live connection regardless of subscriptions.
    /// Used sparingly (system-wide announcements).
    pub async fn emit_to_all(&self, message: &NotificationMessage) -> usize {
        let inner = self.inner.read().await;
        let frame = message.to_json();
        let mut delivered = 0;
        for (connection_id, sender) in &inner.senders {
            if sender.send(Message::Text(frame.clone())).is_ok() {
                delivered += 1;
            } else {
                warn!("Broadcast send failed for connection {}", connection_id);
            }
        }
        delivered
    }

    /// Reply directly on one connection (used for application-level pong).
    pub async fn send_to_connection(&self, connection_id: &str, message: &NotificationMessage) {
        let inner = self.inner.read().await;
        Self::send_frame(&inner, connection_id, &message.to_json());
    }

    /// Best-effort: a dead receiver is logged and skipped, never propagated.
    fn send_frame(inner: &Inner, connection_id: &str, frame: &str) -> bool {
        match inner.senders.get(connection_id) {
            Some(sender) => match sender.send(Message::Text(frame.to_string())) {
                Ok(()) => true,
                Err(_) => {
                    warn!(
                        "Send failed for connection {} (writer gone), skipping",
                        connection_id
                    );
                    false
                }
            },
            None => false,
        }
    }

    // ── Semantic wrappers ─────────────────────────────────────────────────
    //
    // These build the envelope so callers never hand-construct the tag.

    pub async fn notify_new_order(&self, store_id: &str, order: Order) -> usize {
        let msg = NotificationMessage::for_store(store_id, NotificationPayload::NewOrder(order));
        self.emit_to_store(store_id, &msg).await
    }

    pub async fn notify_order_update(&self, store_id: &str, order: Order) -> usize {
        let msg =
            NotificationMessage::for_store(store_id, NotificationPayload::OrderUpdate(order));
        self.emit_to_store(store_id, &msg).await
    }

    pub async fn notify_order_delete(&self, store_id: &str, order_id: &str) -> usize {
        let msg = NotificationMessage::for_store(
            store_id,
            NotificationPayload::OrderDelete {
                id: order_id.to_string(),
            },
        );
        self.emit_to_store(store_id, &msg).await
    }

    pub async fn notify_pending_orders_count(&self, store_id: &str, count: u64) -> usize {
        let msg = NotificationMessage::for_store(
            store_id,
            NotificationPayload::PendingOrdersCount { count },
        );
        self.emit_to_store(store_id, &msg).await
    }

    // ── Diagnostics ───────────────────────────────────────────────────────

    /// Immutable snapshot of connection counts. Never mutates state.
    pub async fn get_stats(&self) -> WsStats {
        let inner = self.inner.read().await;
        let mut stats = inner.registry.stats();
        stats.total_connections = inner.senders.len();
        stats
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
