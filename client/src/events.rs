use shared::types::notification::Order;

use crate::connector::ConnectionState;

/// Callbacks the dashboard wires into the connector.
///
/// Every method defaults to a no-op, so implementors only override the
/// events they care about. Callbacks run synchronously as messages arrive;
/// the transport preserves FIFO order for a single connection, but nothing
/// is guaranteed across distinct event types arriving from separate emits.
pub trait NotificationHandler: Send + Sync + 'static {
    fn on_new_order(&self, _order: Order) {}
    fn on_order_update(&self, _order: Order) {}
    fn on_order_delete(&self, _order_id: String) {}
    fn on_pending_orders_count(&self, _count: u64) {}
    /// Free-form announcements (system-wide broadcasts).
    fn on_notification(&self, _data: serde_json::Value) {}
    /// Reply to an application-level [`StoreConnector::ping`].
    ///
    /// [`StoreConnector::ping`]: crate::connector::StoreConnector::ping
    fn on_pong(&self) {}
    /// Handshake or transport failure, as a human-readable string.
    fn on_error(&self, _message: &str) {}
    fn on_state_change(&self, _state: ConnectionState) {}
}
