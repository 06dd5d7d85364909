use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of hub connection statistics.
/// Serialized and returned by `GET /websocket`. Read-only: building a
/// snapshot never mutates the registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WsStats {
    /// Every live transport connection, subscribed or not.
    pub total_connections: usize,
    /// store id → subscriber count. Topics with zero subscribers never
    /// appear here (they are removed from the registry entirely).
    pub stores: HashMap<String, usize>,
    /// user id → connection count, same lifecycle as `stores`.
    pub users: HashMap<String, usize>,
}

impl WsStats {
    /// Narrow the snapshot to a single store, for the `?store_id=` filter.
    pub fn for_store(&self, store_id: &str) -> Self {
        Self {
            total_connections: self.total_connections,
            stores: self
                .stores
                .get(store_id)
                .map(|n| HashMap::from([(store_id.to_string(), *n)]))
                .unwrap_or_default(),
            users: HashMap::new(),
        }
    }
}
