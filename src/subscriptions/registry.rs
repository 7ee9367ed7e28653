//! Connection registry: connection identity to subscription bundle.

use super::bundle::Subscriptions;
use super::channel::Publisher;
use crate::error::{Result, ServerError};
use crate::types::{ClientId, Metadata};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

/// Registry of open connections and their subscriptions.
///
/// Bundles live inside the map and are only reachable through the lock, so
/// nothing can touch a bundle after its connection was removed. Every
/// operation holds the lock just for the map mutation; publishing and
/// sending happen outside it.
pub struct ConnectionRegistry {
    subscribers: Mutex<HashMap<ClientId, Subscriptions>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a connection with an empty bundle if it is not known yet.
    ///
    /// Returns true if a new entry was created.
    pub fn ensure(&self, id: &ClientId) -> bool {
        let mut subs = self.subscribers.lock();
        if subs.contains_key(id) {
            return false;
        }
        subs.insert(id.clone(), Subscriptions::new(id.clone()));
        debug!(client = %id, "registered connection");
        true
    }

    /// Run `f` on the bundle of `id` under the registry lock.
    pub fn with_subscriber<R, F>(&self, id: &ClientId, f: F) -> Result<R>
    where
        F: FnOnce(&mut Subscriptions) -> R,
    {
        let mut subs = self.subscribers.lock();
        let bundle = subs
            .get_mut(id)
            .ok_or_else(|| ServerError::UnknownSubscriber(id.to_string()))?;
        Ok(f(bundle))
    }

    /// Close every channel of `id` and forget the connection.
    ///
    /// Returns false if the connection was not registered.
    pub fn remove(&self, id: &ClientId) -> bool {
        let removed = self.subscribers.lock().remove(id);
        match removed {
            Some(mut bundle) => {
                bundle.close();
                debug!(client = %id, "removed connection");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.subscribers.lock().contains_key(id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    pub fn client_ids(&self) -> Vec<ClientId> {
        self.subscribers.lock().keys().cloned().collect()
    }

    /// Snapshot of every live metadata publisher.
    pub fn metadata_publishers(&self) -> Vec<Publisher<Metadata>> {
        self.subscribers
            .lock()
            .values()
            .filter_map(Subscriptions::metadata_publisher)
            .collect()
    }

    /// Close and forget every connection. Returns how many were removed.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Subscriptions> = {
            let mut subs = self.subscribers.lock();
            subs.drain().map(|(_, bundle)| bundle).collect()
        };
        let count = drained.len();
        for mut bundle in drained {
            bundle.close();
        }
        count
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
    use crate::subscriptions::channel::Publish;

    #[test]
    fn test_ensure_is_create_if_absent() {
        let registry = ConnectionRegistry::new();
        let id = ClientId::new("a");

        assert!(registry.ensure(&id));
        registry
            .with_subscriber(&id, |subs| subs.subscribe_metadata(4))
            .unwrap()
            .map(drop)
            .unwrap();

        // Existing bundle and its subscription are kept
        assert!(!registry.ensure(&id));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.metadata_publishers().len(), 1);
    }

    #[test]
    fn test_unknown_subscriber() {
        let registry = ConnectionRegistry::new();
        let result = registry.with_subscriber(&ClientId::new("ghost"), |_| ());
        assert!(matches!(result, Err(ServerError::UnknownSubscriber(id)) if id == "ghost"));
    }

    #[test]
    fn test_remove_closes_channels() {
        let registry = ConnectionRegistry::new();
        let id = ClientId::new("a");
        registry.ensure(&id);

        let listener = registry
            .with_subscriber(&id, |subs| subs.subscribe_metadata(4))
            .unwrap()
            .unwrap();
        let publisher = registry.metadata_publishers().pop().unwrap();

        assert!(registry.remove(&id));
        assert!(!registry.contains(&id));
        assert!(listener.is_closed());
        assert_eq!(publisher.publish(Metadata::new(1, "0x1")), Publish::Closed);

        // Second removal is a no-op
        assert!(!registry.remove(&id));
    }

    #[test]
    fn test_close_all() {
        let registry = ConnectionRegistry::new();
        let ids: Vec<ClientId> = (0..3).map(|i| ClientId::new(format!("c{}", i))).collect();
        for id in &ids {
            registry.ensure(id);
        }
        let listener = registry
            .with_subscriber(&ids[0], |subs| subs.subscribe_metadata(4))
            .unwrap()
            .unwrap();

        assert_eq!(registry.close_all(), 3);
        assert!(registry.is_empty());
        assert!(listener.is_closed());
    }
}
