//! Per-connection subscription state.
//!
//! This module owns everything that lives between a storage write and the
//! dispatch loop of a subscribed connection:
//! - [`EventChannel`]: bounded, non-blocking, single-consumer channel that
//!   converts events to their wire form on delivery
//! - [`Subscriptions`]: one connection's bundle, one slot per category
//! - [`ConnectionRegistry`]: lock-protected map of open connections
//!
//! # Example
//!
//! ```ignore
//! let registry = ConnectionRegistry::new();
//! let id = ClientId::generate()?;
//! registry.ensure(&id);
//!
//! let stream = registry.with_subscriber(&id, |subs| subs.subscribe_metadata(1024))??;
//!
//! for publisher in registry.metadata_publishers() {
//!     publisher.publish(Metadata::new(1, "0xabc"));
//! }
//! let msg = stream.recv()?;
//!
//! registry.remove(&id); // closes the channel, stream.recv() now fails
//! ```

mod bundle;
mod channel;
mod registry;

pub use bundle::{metadata_channel, MetadataChannel, MetadataStream, Subscriptions};
pub use channel::{ChannelError, Converter, EventChannel, Listener, Next, Publish, Publisher};
pub use registry::ConnectionRegistry;
