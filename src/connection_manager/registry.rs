//! Connection registry keyed by [`ConnectionId`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::stats::ConnectionStats;
use super::types::{ConnectionHandle, ConnectionId, Frame, SendError};

/// Tracks every connection the transport has accepted and not yet closed.
///
/// Mutation is atomic per key. Iteration snapshots handles shard by shard and
/// releases every lock before calling back into the caller, so a fan-out never
/// holds the map while it sends.
pub struct ConnectionRegistry {
    /// connection_id -> ConnectionHandle
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Add or replace the entry for `handle.id`, returning the replaced handle
    pub fn register(&self, handle: ConnectionHandle) -> Option<Arc<ConnectionHandle>> {
        let id = handle.id.clone();
        self.connections.insert(id, Arc::new(handle))
    }

    /// Remove the entry if present
    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections
            .remove(connection_id)
            .map(|(_, handle)| handle)
    }

    pub fn is_live(&self, connection_id: &ConnectionId) -> bool {
        self.connections
            .get(connection_id)
            .map(|h| h.is_open())
            .unwrap_or(false)
    }

    /// Attempt delivery of one frame to one connection.
    ///
    /// Never blocks and never unregisters; the caller decides what a failure
    /// means.
    pub fn send(&self, connection_id: &ConnectionId, frame: Frame) -> Result<(), SendError> {
        let handle = self
            .connections
            .get(connection_id)
            .map(|h| h.value().clone())
            .ok_or(SendError::NotFound)?;

        if !handle.is_open() {
            return Err(SendError::Closed);
        }

        handle.try_send(frame)
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(connection_id).map(|h| h.clone())
    }

    /// Invoke `f` once per live connection in a point-in-time snapshot
    pub fn for_each_live<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<ConnectionHandle>),
    {
        for handle in self.snapshot() {
            if handle.is_open() {
                f(&handle);
            }
        }
    }

    /// Point-in-time copy of every registered handle
    pub fn snapshot(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.iter().map(|r| r.value().clone()).collect()
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Number of registered entries, open or not
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.connections.iter().filter(|r| r.value().is_open()).count()
    }

    /// Remove entries whose transport has closed and return their ids
    pub fn prune_closed(&self) -> Vec<ConnectionId> {
        let closed: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|r| !r.value().is_open())
            .map(|r| r.key().clone())
            .collect();

        closed
            .into_iter()
            // Re-check under the entry lock: the id may have been re-registered
            .filter(|id| {
                self.connections
                    .remove_if(id, |_, handle| !handle.is_open())
                    .is_some()
            })
            .collect()
    }

    /// Drop every entry, returning how many were removed
    pub fn clear(&self) -> usize {
        let count = self.connections.len();
        self.connections.clear();
        count
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats_at(Utc::now())
    }

    fn stats_at(&self, now: DateTime<Utc>) -> ConnectionStats {
        let mut live = 0;
        let mut oldest_idle = None;
        for entry in self.connections.iter().filter(|r| r.value().is_open()) {
            live += 1;
            let idle = entry.value().idle_seconds(now);
            oldest_idle = Some(oldest_idle.map_or(idle, |max: i64| max.max(idle)));
        }

        ConnectionStats {
            total_connections: self.connections.len(),
            live_connections: live,
            oldest_idle_seconds: oldest_idle,
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn handle(id: &str, buffer: usize) -> (ConnectionHandle, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(buffer);
        (ConnectionHandle::new(ConnectionId::from(id), tx), rx)
    }

    #[tokio::test]
    async fn test_register_and_send() {
        let registry = ConnectionRegistry::new();
        let (h, mut rx) = handle("c1", 4);
        assert!(registry.register(h).is_none());

        let id = ConnectionId::from("c1");
        assert!(registry.is_live(&id));
        registry.send(&id, Frame::from("hello")).unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_unregister_then_send_fails() {
        let registry = ConnectionRegistry::new();
        let (h, _rx) = handle("c1", 4);
        registry.register(h);

        let id = ConnectionId::from("c1");
        assert!(registry.unregister(&id).is_some());
        assert!(!registry.is_live(&id));
        assert_eq!(registry.send(&id, Frame::from("x")), Err(SendError::NotFound));

        // Idempotent
        assert!(registry.unregister(&id).is_none());
    }

    #[tokio::test]
    async fn test_register_overwrites_duplicate() {
        let registry = ConnectionRegistry::new();
        let (first, mut first_rx) = handle("c1", 4);
        let (second, mut second_rx) = handle("c1", 4);
        registry.register(first);
        assert!(registry.register(second).is_some());
        assert_eq!(registry.len(), 1);

        registry.send(&ConnectionId::from("c1"), Frame::from("x")).unwrap();
        assert_eq!(second_rx.recv().await.as_deref(), Some("x"));
        assert!(first_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_transport_is_not_live() {
        let registry = ConnectionRegistry::new();
        let (h, rx) = handle("c1", 4);
        registry.register(h);
        drop(rx);

        let id = ConnectionId::from("c1");
        assert!(registry.contains(&id));
        assert!(!registry.is_live(&id));
        assert_eq!(registry.send(&id, Frame::from("x")), Err(SendError::Closed));
    }

    #[tokio::test]
    async fn test_for_each_live_skips_closed() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = handle("a", 4);
        let (b, rx_b) = handle("b", 4);
        registry.register(a);
        registry.register(b);
        drop(rx_b);

        let mut seen = Vec::new();
        registry.for_each_live(|h| seen.push(h.id.clone()));
        assert_eq!(seen, vec![ConnectionId::from("a")]);
        assert_eq!(registry.live_count(), 1);
    }

    #[tokio::test]
    async fn test_for_each_live_tolerates_mutation() {
        let registry = ConnectionRegistry::new();
        let mut receivers = Vec::new();
        for i in 0..8 {
            let (h, rx) = handle(&format!("c{i}"), 4);
            registry.register(h);
            receivers.push(rx);
        }

        let mut visited = 0;
        registry.for_each_live(|h| {
            registry.unregister(&h.id);
            visited += 1;
        });
        assert_eq!(visited, 8);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_prune_closed() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = handle("a", 4);
        let (b, rx_b) = handle("b", 4);
        registry.register(a);
        registry.register(b);
        drop(rx_b);

        let pruned = registry.prune_closed();
        assert_eq!(pruned, vec![ConnectionId::from("b")]);
        assert_eq!(registry.len(), 1);
        assert!(registry.prune_closed().is_empty());
    }

    #[tokio::test]
    async fn test_stats() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = handle("a", 4);
        let (b, rx_b) = handle("b", 4);
        registry.register(a);
        registry.register(b);
        drop(rx_b);

        let stats = registry.stats();
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.live_connections, 1);
    }

    #[tokio::test]
    async fn test_stats_report_oldest_idle_live_connection() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.stats().oldest_idle_seconds, None);

        let (a, _rx_a) = handle("a", 4);
        let (b, rx_b) = handle("b", 4);
        registry.register(a);
        registry.register(b);
        drop(rx_b);

        let later = Utc::now() + chrono::Duration::seconds(120);
        let idle = registry.stats_at(later).oldest_idle_seconds.unwrap();
        assert!((119..=121).contains(&idle));

        // Activity on the only live connection resets the age
        registry
            .get(&ConnectionId::from("a"))
            .unwrap()
            .update_activity();
        assert!(registry.stats().oldest_idle_seconds.unwrap() <= 1);
    }
}
