//! # metafeed
//!
//! Real-time notification layer of a metadata indexing service.
//!
//! Clients open a connection, subscribe to newly indexed metadata and
//! receive every record as the storage layer writes it. The same server
//! answers point lookups and paginated listings.
//!
//! ## Core Concepts
//!
//! - **Connections**: each transport connection gets a random [`ClientId`]
//!   and an entry in the [`ConnectionRegistry`] for as long as it is open
//! - **Subscriptions**: a connection holds at most one live
//!   [`EventChannel`] per event category
//! - **Dispatch**: one loop per streaming call relays channel output to the
//!   peer until the call or the channel ends
//! - **Queries**: stateless handlers over a [`MetadataStorage`] engine
//!
//! ## Example
//!
//! ```ignore
//! use metafeed::{MemoryStorage, Server, ServerConfig, ConnEvent};
//!
//! let storage = Arc::new(MemoryStorage::new());
//! let server = Server::new(ServerConfig::default(), storage.clone())?;
//! storage.add_listener(server.notifier());
//!
//! let tag = server.hook().tag_conn();
//! server.hook().handle_conn(&tag, ConnEvent::Begin);
//!
//! // Writes now reach every subscribed connection
//! storage.save(Metadata::new(1, "0xabc"));
//! ```

pub mod config;
pub mod error;
pub mod server;
pub mod storage;
pub mod subscriptions;
pub mod types;
pub mod wire;

// Re-exports
pub use config::ServerConfig;
pub use error::{Code, Result, ServerError};
pub use server::{
    CallContext, CallHandle, ConnEvent, ConnTag, ConnectionHook, DispatchExit, Notifier,
    SendError, Server, StreamSink,
};
pub use storage::{
    MemoryStorage, MetadataListener, MetadataStorage, QueryContext, StorageError, StorageResult,
};
pub use subscriptions::{
    ChannelError, ConnectionRegistry, EventChannel, Listener, MetadataChannel, MetadataStream,
    Publish, Publisher, Subscriptions,
};
pub use types::{ClientId, Metadata, Page, SortOrder};
