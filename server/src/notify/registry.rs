use std::collections::{HashMap, HashSet};

use shared::types::stats::WsStats;

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

/// Bidirectional index of topic subscriptions.
///
/// Forward maps: store id → subscriber connection ids, user id → connection
/// ids. A reverse index (connection id → the topics it belongs to) makes
/// [`remove_all_for_connection`] proportional to that connection's own
/// memberships rather than a scan of every topic.
///
/// Pure bookkeeping: no I/O, no locking (the owning manager serialises
/// access), and every operation is total — removing something that is not
/// there is a no-op, never an error.
///
/// Invariant: a topic or channel whose subscriber set empties is deleted
/// outright, so the maps never accumulate dangling empty entries over a long
/// uptime.
///
/// [`remove_all_for_connection`]: ConnectionRegistry::remove_all_for_connection
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// store id → subscribed connection ids
    stores: HashMap<String, HashSet<String>>,
    /// user id → connection ids
    users: HashMap<String, HashSet<String>>,
    /// connection id → its memberships, for O(memberships) teardown
    memberships: HashMap<String, Memberships>,
}

#[derive(Debug, Default)]
struct Memberships {
    stores: HashSet<String>,
    users: HashSet<String>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Store topics ──────────────────────────────────────────────────────

    /// Idempotent: subscribing twice leaves a single membership.
    pub fn add_store_connection(&mut self, store_id: &str, connection_id: &str) {
        self.stores
            .entry(store_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
        self.memberships
            .entry(connection_id.to_string())
            .or_default()
            .stores
            .insert(store_id.to_string());
    }

    pub fn remove_store_connection(&mut self, store_id: &str, connection_id: &str) {
        if let Some(set) = self.stores.get_mut(store_id) {
            set.remove(connection_id);
            if set.is_empty() {
                self.stores.remove(store_id);
            }
        }
        if let Some(m) = self.memberships.get_mut(connection_id) {
            m.stores.remove(store_id);
        }
    }

    // ── User channels ─────────────────────────────────────────────────────

    pub fn add_user_connection(&mut self, user_id: &str, connection_id: &str) {
        self.users
            .entry(user_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
        self.memberships
            .entry(connection_id.to_string())
            .or_default()
            .users
            .insert(user_id.to_string());
    }

    pub fn remove_user_connection(&mut self, user_id: &str, connection_id: &str) {
        if let Some(set) = self.users.get_mut(user_id) {
            set.remove(connection_id);
            if set.is_empty() {
                self.users.remove(user_id);
            }
        }
        if let Some(m) = self.memberships.get_mut(connection_id) {
            m.users.remove(user_id);
        }
    }

    // ── Teardown ──────────────────────────────────────────────────────────

    /// Purge a connection from every topic and channel it appears in.
    /// Called exactly once, from the disconnect handler.
    pub fn remove_all_for_connection(&mut self, connection_id: &str) {
        let Some(memberships) = self.memberships.remove(connection_id) else {
            return;
        };
        for store_id in memberships.stores {
            if let Some(set) = self.stores.get_mut(&store_id) {
                set.remove(connection_id);
                if set.is_empty() {
                    self.stores.remove(&store_id);
                }
            }
        }
        for user_id in memberships.users {
            if let Some(set) = self.users.get_mut(&user_id) {
                set.remove(connection_id);
                if set.is_empty() {
                    self.users.remove(&user_id);
                }
            }
        }
    }

    // ── Lookups ───────────────────────────────────────────────────────────

    pub fn store_subscribers(&self, store_id: &str) -> Option<&HashSet<String>> {
        self.stores.get(store_id)
    }

    pub fn user_connections(&self, user_id: &str) -> Option<&HashSet<String>> {
        self.users.get(user_id)
    }

    /// Subscriber-count snapshot (total connection count is filled in by the
    /// manager, which owns the sender map).
    pub fn stats(&self) -> WsStats {
        WsStats {
            total_connections: 0,
            stores: self
                .stores
                .iter()
                .map(|(k, v)| (k.clone(), v.len()))
                .collect(),
            users: self
                .users
                .iter()
                .map(|(k, v)| (k.clone(), v.len()))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_store_connection_is_idempotent() {
        let mut reg = ConnectionRegistry::new();
        reg.add_store_connection("s1", "c1");
        reg.add_store_connection("s1", "c1");
        assert_eq!(reg.store_subscribers("s1").map(|s| s.len()), Some(1));
    }

    #[test]
    fn removing_last_subscriber_deletes_the_topic() {
        let mut reg = ConnectionRegistry::new();
        reg.add_store_connection("s1", "c1");
        reg.remove_store_connection("s1", "c1");
        assert!(reg.store_subscribers("s1").is_none());
        assert!(reg.stats().stores.is_empty());
    }

    #[test]
    fn removing_one_of_two_subscribers_keeps_the_topic() {
        let mut reg = ConnectionRegistry::new();
        reg.add_store_connection("s1", "c1");
        reg.add_store_connection("s1", "c2");
        reg.remove_store_connection("s1", "c1");
        let subs = reg.store_subscribers("s1").unwrap();
        assert_eq!(subs.len(), 1);
        assert!(subs.contains("c2"));
    }

    #[test]
    fn remove_operations_are_total() {
        let mut reg = ConnectionRegistry::new();
        // None of these may panic or create entries.
        reg.remove_store_connection("ghost", "c1");
        reg.remove_user_connection("ghost", "c1");
        reg.remove_all_for_connection("c1");
        assert!(reg.stats().stores.is_empty());
        assert!(reg.stats().users.is_empty());
    }

    #[test]
    fn disconnect_purges_every_membership() {
        let mut reg = ConnectionRegistry::new();
        reg.add_store_connection("s1", "c1");
        reg.add_store_connection("s2", "c1");
        reg.add_user_connection("u1", "c1");
        reg.add_store_connection("s1", "c2");

        reg.remove_all_for_connection("c1");

        assert!(!reg.store_subscribers("s1").unwrap().contains("c1"));
        assert!(reg.store_subscribers("s2").is_none());
        assert!(reg.user_connections("u1").is_none());
        // the other connection is untouched
        assert!(reg.store_subscribers("s1").unwrap().contains("c2"));
    }

    #[test]
    fn user_channels_mirror_store_lifecycle() {
        let mut reg = ConnectionRegistry::new();
        reg.add_user_connection("u1", "c1");
        reg.add_user_connection("u1", "c1");
        assert_eq!(reg.user_connections("u1").map(|s| s.len()), Some(1));
        reg.remove_user_connection("u1", "c1");
        assert!(reg.user_connections("u1").is_none());
    }

    #[test]
    fn stats_counts_subscribers_per_topic() {
        let mut reg = ConnectionRegistry::new();
        reg.add_store_connection("a", "c1");
        reg.add_store_connection("a", "c2");
        reg.add_store_connection("b", "c1");
        let stats = reg.stats();
        assert_eq!(stats.stores["a"], 2);
        assert_eq!(stats.stores["b"], 1);
    }
}
