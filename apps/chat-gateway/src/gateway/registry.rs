//! Live set of gateway connections.

use std::sync::Arc;

use dashmap::DashMap;

use super::connection::Connection;

/// Registry of connections keyed by connection id.
///
/// Uses `DashMap` for shard-level concurrency: no lock is held while a
/// caller iterates a snapshot or writes to a transport.
pub struct ConnectionRegistry {
    connections: DashMap<String, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection. Closed connections are refused.
    pub fn insert(&self, conn: Arc<Connection>) -> bool {
        if conn.is_closed() {
            return false;
        }
        self.connections.insert(conn.id().to_string(), conn);
        true
    }

    pub fn get(&self, id: &str) -> Option<Arc<Connection>> {
        self.connections.get(id).map(|c| Arc::clone(c.value()))
    }

    /// Point-in-time copy of the registered handles.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Drop every closed connection. Returns the number removed.
    pub fn remove_closed(&self) -> usize {
        let before = self.connections.len();
        self.connections.retain(|_, conn| !conn.is_closed());
        before.saturating_sub(self.connections.len())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
