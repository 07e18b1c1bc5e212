//! Connection Store: in-memory cache of per-platform connection status

use crate::model::Connection;
use crate::platform::PlatformId;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Shared cache read by the composer, the assistant bridge and the pipeline
///
/// Only the connection manager writes to it.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStore {
    connections: Arc<RwLock<BTreeMap<PlatformId, Connection>>>,
}

impl ConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, platform: &PlatformId) -> Option<Connection> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(platform)
            .cloned()
    }

    pub fn is_connected(&self, platform: &PlatformId) -> bool {
        self.get(platform).is_some_and(|c| c.connected)
    }

    /// Connected platforms, sorted by id
    pub fn connected_platforms(&self) -> Vec<PlatformId> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|c| c.connected)
            .map(|c| c.platform_id.clone())
            .collect()
    }

    pub fn all(&self) -> Vec<Connection> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub(crate) fn apply(&self, connection: Connection) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connection.platform_id.clone(), connection);
    }

    pub(crate) fn replace_all(&self, connections: Vec<Connection>) {
        let map = connections
            .into_iter()
            .map(|c| (c.platform_id.clone(), c))
            .collect();
        *self.connections.write().unwrap_or_else(PoisonError::into_inner) = map;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_platforms_filters_disconnected() {
        let store = ConnectionStore::new();
        store.apply(Connection::connected(PlatformId::new("twitter")));
        store.apply(Connection::connected(PlatformId::new("linkedin")));
        store.apply(Connection::disconnected(PlatformId::new("facebook")));

        assert_eq!(
            store.connected_platforms(),
            vec![PlatformId::new("linkedin"), PlatformId::new("twitter")]
        );
        assert!(!store.is_connected(&PlatformId::new("facebook")));
        assert!(!store.is_connected(&PlatformId::new("threads")));
    }

    #[test]
    fn test_replace_all_drops_previous_entries() {
        let store = ConnectionStore::new();
        store.apply(Connection::connected(PlatformId::new("twitter")));
        store.replace_all(vec![Connection::connected(PlatformId::new("mastodon"))]);

        assert_eq!(store.all().len(), 1);
        assert!(store.get(&PlatformId::new("twitter")).is_none());
    }
}
