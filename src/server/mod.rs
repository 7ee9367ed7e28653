//! Metadata service handlers.
//!
//! [`Server`] is the composition root: it owns the connection registry,
//! the lifecycle hook and the storage handle, and exposes one method per
//! protocol call. The transport drives it:
//!
//! ```ignore
//! let storage = Arc::new(MemoryStorage::new());
//! let server = Server::new(ServerConfig::default(), storage.clone())?;
//! storage.add_listener(server.notifier());
//!
//! // per connection
//! let tag = server.hook().tag_conn();
//! server.hook().handle_conn(&tag, ConnEvent::Begin);
//!
//! // per call
//! let (ctx, call) = server.hook().tag_rpc(&tag);
//! let hello = server.hello(&ctx, &HelloRequest {})?;
//! server.subscribe_on_metadata(&ctx, &DefaultRequest { id: hello.id }, &mut sink)?;
//! ```

mod context;
mod dispatch;
mod lifecycle;
mod query;

pub use context::{CallContext, CallHandle};
pub use dispatch::{dispatch, DispatchExit, SendError, StreamSink};
pub use lifecycle::{ConnEvent, ConnTag, ConnectionHook, IdSource};
pub use query::run_query;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::storage::{MetadataListener, MetadataStorage};
use crate::subscriptions::{ConnectionRegistry, Publish};
use crate::types::{ClientId, Metadata, Page};
use crate::wire;
use std::sync::Arc;
use tracing::debug;

/// Fans storage writes out to subscribed connections.
pub struct Notifier {
    registry: Arc<ConnectionRegistry>,
}

impl Notifier {
    /// Publish to every metadata subscriber.
    ///
    /// Returns how many subscriptions accepted the event. Publishers are
    /// collected under the registry lock and fed after it is released.
    pub fn notify(&self, metadata: &Metadata) -> usize {
        let mut delivered = 0;
        for publisher in self.registry.metadata_publishers() {
            if publisher.publish(metadata.clone()) == Publish::Delivered {
                delivered += 1;
            }
        }
        delivered
    }
}

impl MetadataListener for Notifier {
    fn on_metadata(&self, metadata: &Metadata) {
        self.notify(metadata);
    }
}

/// Metadata service.
pub struct Server {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    hook: ConnectionHook,
    notifier: Arc<Notifier>,
    storage: Arc<dyn MetadataStorage>,
}

impl Server {
    pub fn new(config: ServerConfig, storage: Arc<dyn MetadataStorage>) -> Result<Self> {
        let registry = Arc::new(ConnectionRegistry::new());
        let hook = ConnectionHook::new(Arc::clone(&registry));
        Self::with_hook(config, storage, registry, hook)
    }

    /// Build with a custom lifecycle hook sharing `registry`.
    pub fn with_hook(
        config: ServerConfig,
        storage: Arc<dyn MetadataStorage>,
        registry: Arc<ConnectionRegistry>,
        hook: ConnectionHook,
    ) -> Result<Self> {
        config.validate()?;
        let notifier = Arc::new(Notifier {
            registry: Arc::clone(&registry),
        });
        Ok(Self {
            config,
            registry,
            hook,
            notifier,
            storage,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn hook(&self) -> &ConnectionHook {
        &self.hook
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Listener to register with the storage layer.
    pub fn notifier(&self) -> Arc<Notifier> {
        Arc::clone(&self.notifier)
    }

    /// Publish a freshly written record to all subscribers.
    pub fn notify_metadata(&self, metadata: &Metadata) -> usize {
        self.notifier.notify(metadata)
    }

    /// Close every subscription and forget every connection.
    pub fn shutdown(&self) {
        let closed = self.registry.close_all();
        debug!(connections = closed, "server shut down");
    }

    // --- Subscriptions ---

    /// Report the caller's connection identity.
    pub fn hello(
        &self,
        ctx: &CallContext,
        _req: &wire::HelloRequest,
    ) -> Result<wire::HelloResponse> {
        let id = ctx.client_id()?;
        Ok(wire::HelloResponse { id: id.to_string() })
    }

    /// Stream metadata events to the caller until the call ends.
    ///
    /// A previous metadata subscription of the same connection is closed,
    /// which terminates its stream.
    pub fn subscribe_on_metadata<S>(
        &self,
        ctx: &CallContext,
        req: &wire::DefaultRequest,
        sink: &mut S,
    ) -> Result<DispatchExit>
    where
        S: StreamSink<wire::Metadata> + ?Sized,
    {
        let id = ClientId::new(req.id.as_str());
        let capacity = self.config.channel_capacity;
        let listener = self
            .registry
            .with_subscriber(&id, |subs| subs.subscribe_metadata(capacity))??;
        debug!(client = %id, "subscribed on metadata");

        let exit = dispatch(&listener, ctx, sink);

        // Drop our slot unless it was already replaced or cleared.
        if let Ok(true) = self
            .registry
            .with_subscriber(&id, |subs| subs.release_metadata(&listener))
        {
            debug!(client = %id, "released metadata subscription");
        }
        exit
    }

    /// Cancel the caller's metadata subscription. A no-op if there is none.
    pub fn unsubscribe_from_metadata(
        &self,
        _ctx: &CallContext,
        req: &wire::DefaultRequest,
    ) -> Result<wire::Message> {
        let id = ClientId::new(req.id.as_str());
        let was_subscribed = self
            .registry
            .with_subscriber(&id, |subs| subs.unsubscribe_metadata())?;
        debug!(client = %id, was_subscribed, "unsubscribed from metadata");
        Ok(wire::Message::success())
    }

    // --- Queries ---

    /// Look up one record by contract address.
    ///
    /// Bounded by the configured lookup timeout and abandoned early if the
    /// call ends.
    pub fn get_metadata(
        &self,
        ctx: &CallContext,
        req: &wire::GetMetadataRequest,
    ) -> Result<wire::Metadata> {
        if req.address.is_empty() {
            return Err(ServerError::InvalidRequest("address is required".to_string()));
        }
        let storage = Arc::clone(&self.storage);
        let address = req.address.clone();
        let metadata = run_query(ctx.done(), Some(self.config.lookup_timeout), move |qctx| {
            storage.get_by_address(qctx, &address)
        })?;
        Ok(metadata.into())
    }

    pub fn list_metadata(
        &self,
        ctx: &CallContext,
        req: &wire::ListMetadataRequest,
    ) -> Result<wire::ListMetadataResponse> {
        let page = Page::from(req.page.as_ref());
        let storage = Arc::clone(&self.storage);
        let records = run_query(ctx.done(), None, move |qctx| storage.list(qctx, &page))?;
        Ok(records.into())
    }

    pub fn get_metadata_by_method_signature(
        &self,
        ctx: &CallContext,
        req: &wire::GetMetadataByMethodSignatureRequest,
    ) -> Result<wire::ListMetadataResponse> {
        let page = Page::from(req.page.as_ref());
        let storage = Arc::clone(&self.storage);
        let signature = req.signature.clone();
        let records = run_query(ctx.done(), None, move |qctx| {
            storage.get_by_method_signature(qctx, &signature, &page)
        })?;
        Ok(records.into())
    }

    pub fn get_metadata_by_topic(
        &self,
        ctx: &CallContext,
        req: &wire::GetMetadataByTopicRequest,
    ) -> Result<wire::ListMetadataResponse> {
        let page = Page::from(req.page.as_ref());
        let storage = Arc::clone(&self.storage);
        let topic = req.topic.clone();
        let records = run_query(ctx.done(), None, move |qctx| {
            storage.get_by_topic(qctx, &topic, &page)
        })?;
        Ok(records.into())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.registry.close_all();
    }
}
