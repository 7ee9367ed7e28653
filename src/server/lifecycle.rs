//! Connection lifecycle hook.
//!
//! The transport calls [`ConnectionHook::tag_conn`] when a connection is
//! accepted, [`ConnectionHook::handle_conn`] on begin and end, and
//! [`ConnectionHook::tag_rpc`] for every call made over the connection.

use super::context::{CallContext, CallHandle};
use crate::subscriptions::ConnectionRegistry;
use crate::types::ClientId;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Source of connection identities.
pub type IdSource = Box<dyn Fn() -> Result<ClientId, rand::Error> + Send + Sync>;

/// Transport-level connection events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnEvent {
    Begin,
    End,
}

/// Identity attached to one transport connection.
#[derive(Clone, Debug)]
pub struct ConnTag {
    id: ClientId,
}

impl ConnTag {
    pub fn id(&self) -> &ClientId {
        &self.id
    }
}

/// Mints connection identities and keeps the registry in step with the
/// set of open connections.
pub struct ConnectionHook {
    registry: Arc<ConnectionRegistry>,
    ids: IdSource,
}

impl ConnectionHook {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self::with_id_source(registry, Box::new(ClientId::generate))
    }

    pub fn with_id_source(registry: Arc<ConnectionRegistry>, ids: IdSource) -> Self {
        Self { registry, ids }
    }

    /// Mint the identity of a newly accepted connection.
    ///
    /// Never fails: if the random source errors the connection proceeds
    /// with an empty identity and cannot subscribe.
    pub fn tag_conn(&self) -> ConnTag {
        let id = (self.ids)().unwrap_or_else(|err| {
            error!(error = %err, "generating connection id");
            ClientId::default()
        });
        ConnTag { id }
    }

    pub fn handle_conn(&self, tag: &ConnTag, event: ConnEvent) {
        match event {
            ConnEvent::Begin => {
                if tag.id.is_empty() {
                    warn!("connection without identity, subscriptions disabled");
                    return;
                }
                self.registry.ensure(&tag.id);
            }
            ConnEvent::End => {
                if !self.registry.remove(&tag.id) {
                    debug!(client = %tag.id, "connection ended without registry entry");
                }
            }
        }
    }

    /// Context for one call on the tagged connection.
    pub fn tag_rpc(&self, tag: &ConnTag) -> (CallContext, CallHandle) {
        let id = (!tag.id.is_empty()).then(|| tag.id.clone());
        CallContext::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use std::io;

    #[test]
    fn test_begin_and_end() {
        let registry = Arc::new(ConnectionRegistry::new());
        let hook = ConnectionHook::new(Arc::clone(&registry));

        let tag = hook.tag_conn();
        hook.handle_conn(&tag, ConnEvent::Begin);
        assert!(registry.contains(tag.id()));

        let (ctx, _handle) = hook.tag_rpc(&tag);
        assert_eq!(ctx.client_id().unwrap(), tag.id());

        hook.handle_conn(&tag, ConnEvent::End);
        assert!(registry.is_empty());

        // Ending twice is harmless
        hook.handle_conn(&tag, ConnEvent::End);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rng_failure_degrades() {
        let registry = Arc::new(ConnectionRegistry::new());
        let hook = ConnectionHook::with_id_source(
            Arc::clone(&registry),
            Box::new(|| {
                Err(rand::Error::new(io::Error::new(
                    io::ErrorKind::Other,
                    "entropy unavailable",
                )))
            }),
        );

        let tag = hook.tag_conn();
        assert!(tag.id().is_empty());

        hook.handle_conn(&tag, ConnEvent::Begin);
        assert!(registry.is_empty());

        let (ctx, _handle) = hook.tag_rpc(&tag);
        assert!(matches!(ctx.client_id(), Err(ServerError::UnknownClient)));

        hook.handle_conn(&tag, ConnEvent::End);
    }
}
