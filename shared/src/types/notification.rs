// shared/src/types/notification.rs
// Wire envelope for the order-notification channel.

use serde::{Deserialize, Serialize};

/// One order as the storefront's REST layer hands it to the notifier.
///
/// The hub never reads the database itself — callers pass the already
/// persisted order. Only `id` and `total` are interpreted here; everything
/// else (customer, items, status, ...) passes through untouched in `extra`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub total: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Order {
    pub fn new(id: &str, total: f64) -> Self {
        Self {
            id: id.to_string(),
            total,
            extra: serde_json::Map::new(),
        }
    }
}

/// Per-type payload of a server→client notification.
///
/// Tagged union keyed by `type` with the payload under `data`, so consumers
/// get exhaustive-match safety instead of casting an opaque blob. `type` is
/// a closed set — an unknown type is a caller bug, not a wire condition.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NotificationPayload {
    NewOrder(Order),
    OrderUpdate(Order),
    OrderDelete { id: String },
    PendingOrdersCount { count: u64 },
    /// Free-form announcement, e.g. a system-wide broadcast.
    Notification(serde_json::Value),
    Ping,
    Pong,
}

impl NotificationPayload {
    /// Wire name of the event, for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::NewOrder(_) => "new_order",
            Self::OrderUpdate(_) => "order_update",
            Self::OrderDelete { .. } => "order_delete",
            Self::PendingOrdersCount { .. } => "pending_orders_count",
            Self::Notification(_) => "notification",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }
}

/// The envelope every server→client message travels in.
///
/// `timestamp` is stamped at emission time (ISO-8601). Field names on the
/// wire are camelCase to match the dashboard protocol.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NotificationMessage {
    #[serde(flatten)]
    pub payload: NotificationPayload,
    #[serde(rename = "storeId", default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub timestamp: String,
}

impl NotificationMessage {
    /// Build an envelope with no addressing, stamped now.
    pub fn new(payload: NotificationPayload) -> Self {
        Self {
            payload,
            store_id: None,
            user_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Envelope addressed to a store topic.
    pub fn for_store(store_id: &str, payload: NotificationPayload) -> Self {
        let mut msg = Self::new(payload);
        msg.store_id = Some(store_id.to_string());
        msg
    }

    /// Envelope addressed to a single user's channel.
    pub fn for_user(user_id: &str, payload: NotificationPayload) -> Self {
        let mut msg = Self::new(payload);
        msg.user_id = Some(user_id.to_string());
        msg
    }

    /// Serialise for the wire. Falls back to `{}` on the (unreachable in
    /// practice) serialisation failure, matching best-effort delivery.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Commands a client sends to the hub.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    SubscribeStore {
        #[serde(rename = "storeId")]
        store_id: String,
    },
    UnsubscribeStore {
        #[serde(rename = "storeId")]
        store_id: String,
    },
    Ping,
}

impl ClientCommand {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
