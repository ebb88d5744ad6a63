//! Audience registries: who is connected, and under which key
//!
//! A registry is plain data. It is only ever touched by its hub's processing
//! loop, so nothing here is synchronized.

use super::connection::{Connection, ConnectionId};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Point-in-time registry size, reported by `Hub::stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub connections: usize,
    pub keys: usize,
}

/// Connection-membership state owned by one hub.
pub trait AudienceRegistry: Send + 'static {
    /// Routing key. `()` for audiences without partitioning.
    type Key: Clone + fmt::Debug + Send + Sync + 'static;

    /// Admit a connection under `key`. Returns a previously registered handle
    /// with the same id if this admission displaced one.
    fn admit(
        &mut self,
        key: Self::Key,
        id: ConnectionId,
        conn: Box<dyn Connection>,
    ) -> Option<Box<dyn Connection>>;

    /// Remove a connection, returning it so the caller can close it.
    fn remove(&mut self, key: &Self::Key, id: ConnectionId) -> Option<Box<dyn Connection>>;

    /// Ids currently registered for `key`.
    fn members(&self, key: &Self::Key) -> Vec<ConnectionId>;

    fn get_mut(&mut self, key: &Self::Key, id: ConnectionId) -> Option<&mut Box<dyn Connection>>;

    fn stats(&self) -> HubStats;
}

// ============================================================================
// Broadcast
// ============================================================================

/// Flat set of connections; every publish reaches all of them.
#[derive(Default)]
pub struct BroadcastRegistry {
    connections: HashMap<ConnectionId, Box<dyn Connection>>,
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }
}

impl AudienceRegistry for BroadcastRegistry {
    type Key = ();

    fn admit(
        &mut self,
        _key: (),
        id: ConnectionId,
        conn: Box<dyn Connection>,
    ) -> Option<Box<dyn Connection>> {
        self.connections.insert(id, conn)
    }

    fn remove(&mut self, _key: &(), id: ConnectionId) -> Option<Box<dyn Connection>> {
        self.connections.remove(&id)
    }

    fn members(&self, _key: &()) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    fn get_mut(&mut self, _key: &(), id: ConnectionId) -> Option<&mut Box<dyn Connection>> {
        self.connections.get_mut(&id)
    }

    fn stats(&self) -> HubStats {
        HubStats {
            connections: self.connections.len(),
            keys: usize::from(!self.connections.is_empty()),
        }
    }
}

// ============================================================================
// Keyed
// ============================================================================

/// Connections partitioned by a routing key (employee id, chat room id).
///
/// Invariants: no bucket is ever empty, and a connection id lives under at
/// most one key.
pub struct KeyedRegistry<K> {
    buckets: HashMap<K, HashMap<ConnectionId, Box<dyn Connection>>>,
    index: HashMap<ConnectionId, K>,
}

impl<K> Default for KeyedRegistry<K> {
    fn default() -> Self {
        Self {
            buckets: HashMap::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The key a connection is registered under, if any.
    pub fn key_of(&self, id: ConnectionId) -> Option<&K> {
        self.index.get(&id)
    }

    pub fn has_key(&self, key: &K) -> bool {
        self.buckets.contains_key(key)
    }

    fn take(&mut self, key: &K, id: ConnectionId) -> Option<Box<dyn Connection>> {
        let bucket = self.buckets.get_mut(key)?;
        let conn = bucket.remove(&id)?;
        if bucket.is_empty() {
            self.buckets.remove(key);
        }
        self.index.remove(&id);
        Some(conn)
    }
}

impl<K> AudienceRegistry for KeyedRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    type Key = K;

    fn admit(
        &mut self,
        key: K,
        id: ConnectionId,
        conn: Box<dyn Connection>,
    ) -> Option<Box<dyn Connection>> {
        let displaced = match self.index.get(&id).cloned() {
            Some(previous) => self.take(&previous, id),
            None => None,
        };
        self.buckets.entry(key.clone()).or_default().insert(id, conn);
        self.index.insert(id, key);
        displaced
    }

    fn remove(&mut self, key: &K, id: ConnectionId) -> Option<Box<dyn Connection>> {
        self.take(key, id)
    }

    fn members(&self, key: &K) -> Vec<ConnectionId> {
        self.buckets
            .get(key)
            .map(|bucket| bucket.keys().copied().collect())
            .unwrap_or_default()
    }

    fn get_mut(&mut self, key: &K, id: ConnectionId) -> Option<&mut Box<dyn Connection>> {
        self.buckets.get_mut(key)?.get_mut(&id)
    }

    fn stats(&self) -> HubStats {
        HubStats {
            connections: self.index.len(),
            keys: self.buckets.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::mock::MockConnection;

    fn boxed() -> Box<dyn Connection> {
        Box::new(MockConnection::new())
    }

    /// Every indexed id is in exactly the bucket the index names, and no
    /// bucket is empty.
    fn assert_consistent(registry: &KeyedRegistry<String>) {
        for (key, bucket) in &registry.buckets {
            assert!(!bucket.is_empty(), "empty bucket left for {key}");
            for id in bucket.keys() {
                assert_eq!(registry.index.get(id), Some(key));
            }
        }
        let bucketed: usize = registry.buckets.values().map(|b| b.len()).sum();
        assert_eq!(bucketed, registry.index.len());
    }

    #[test]
    fn test_broadcast_admit_and_remove() {
        let mut registry = BroadcastRegistry::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        assert!(registry.admit((), a, boxed()).is_none());
        assert!(registry.admit((), b, boxed()).is_none());
        assert_eq!(registry.stats(), HubStats { connections: 2, keys: 1 });

        assert!(registry.remove(&(), a).is_some());
        assert!(!registry.contains(a));
        assert_eq!(registry.members(&()), vec![b]);
    }

    #[test]
    fn test_broadcast_readmit_same_id_keeps_single_entry() {
        let mut registry = BroadcastRegistry::new();
        let id = ConnectionId::new();
        registry.admit((), id, boxed());
        assert!(registry.admit((), id, boxed()).is_some());
        assert_eq!(registry.stats().connections, 1);
    }

    #[test]
    fn test_broadcast_empty_stats() {
        let registry = BroadcastRegistry::new();
        assert_eq!(registry.stats(), HubStats::default());
    }

    #[test]
    fn test_keyed_remove_last_member_drops_bucket() {
        let mut registry = KeyedRegistry::new();
        let id = ConnectionId::new();
        registry.admit("e1".to_string(), id, boxed());
        assert!(registry.has_key(&"e1".to_string()));

        assert!(registry.remove(&"e1".to_string(), id).is_some());
        assert!(!registry.has_key(&"e1".to_string()));
        assert_eq!(registry.stats(), HubStats::default());
        assert_consistent(&registry);
    }

    #[test]
    fn test_keyed_remove_is_idempotent() {
        let mut registry = KeyedRegistry::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        registry.admit("r1".to_string(), a, boxed());
        registry.admit("r1".to_string(), b, boxed());

        assert!(registry.remove(&"r1".to_string(), a).is_some());
        assert!(registry.remove(&"r1".to_string(), a).is_none());
        assert!(registry.remove(&"missing".to_string(), a).is_none());
        assert_eq!(registry.members(&"r1".to_string()), vec![b]);
        assert_consistent(&registry);
    }

    #[test]
    fn test_keyed_readmit_moves_connection_between_keys() {
        let mut registry = KeyedRegistry::new();
        let id = ConnectionId::new();
        registry.admit("e1".to_string(), id, boxed());

        let displaced = registry.admit("e2".to_string(), id, boxed());
        assert!(displaced.is_some());
        assert_eq!(registry.key_of(id), Some(&"e2".to_string()));
        assert!(!registry.has_key(&"e1".to_string()));
        assert_eq!(registry.stats(), HubStats { connections: 1, keys: 1 });
        assert_consistent(&registry);
    }

    #[test]
    fn test_keyed_invariants_hold_over_mixed_sequence() {
        let mut registry = KeyedRegistry::new();
        let ids: Vec<ConnectionId> = (0..6).map(|_| ConnectionId::new()).collect();
        let keys = ["a", "b", "c"];

        for (i, id) in ids.iter().enumerate() {
            registry.admit(keys[i % 3].to_string(), *id, boxed());
            assert_consistent(&registry);
        }
        // Move, remove, remove again, remove under the wrong key
        registry.admit("c".to_string(), ids[0], boxed());
        assert_consistent(&registry);
        registry.remove(&"b".to_string(), ids[1]);
        assert_consistent(&registry);
        registry.remove(&"b".to_string(), ids[1]);
        registry.remove(&"a".to_string(), ids[2]);
        assert_consistent(&registry);
        registry.remove(&"b".to_string(), ids[4]);
        assert_consistent(&registry);

        assert!(!registry.has_key(&"b".to_string()));
        assert_eq!(registry.key_of(ids[2]), Some(&"c".to_string()));
        assert_eq!(registry.stats().connections, 4);
    }

    #[test]
    fn test_keyed_members_of_unknown_key_is_empty() {
        let registry: KeyedRegistry<String> = KeyedRegistry::new();
        assert!(registry.members(&"nobody".to_string()).is_empty());
    }
}
