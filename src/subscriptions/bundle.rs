//! Per-connection subscription bundle.

use super::channel::{ChannelError, EventChannel, Listener, Publisher};
use crate::types::{ClientId, Metadata};
use crate::wire;

/// Channel carrying indexed metadata to one subscriber.
pub type MetadataChannel = EventChannel<Metadata, wire::Metadata>;

/// Consumer side of a [`MetadataChannel`].
pub type MetadataStream = Listener<Metadata, wire::Metadata>;

/// Build a metadata channel with the wire conversion installed.
pub fn metadata_channel(capacity: usize) -> MetadataChannel {
    EventChannel::new(capacity, |metadata: Metadata| wire::Metadata::from(metadata))
}

/// Subscriptions held by one connection.
///
/// One slot per event category. A slot is either empty or holds the single
/// live channel for that category.
pub struct Subscriptions {
    id: ClientId,
    metadata: Option<MetadataChannel>,
}

impl Subscriptions {
    pub fn new(id: ClientId) -> Self {
        Self { id, metadata: None }
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Install a fresh metadata channel and return its stream.
    ///
    /// A previous channel is closed first so its dispatch loop exits.
    pub fn subscribe_metadata(
        &mut self,
        capacity: usize,
    ) -> Result<MetadataStream, ChannelError> {
        if let Some(mut previous) = self.metadata.take() {
            previous.close();
        }
        let channel = metadata_channel(capacity);
        let listener = channel.listen()?;
        self.metadata = Some(channel);
        Ok(listener)
    }

    /// Close and clear the metadata slot. Returns whether it was occupied.
    pub fn unsubscribe_metadata(&mut self) -> bool {
        match self.metadata.take() {
            Some(mut channel) => {
                channel.close();
                true
            }
            None => false,
        }
    }

    /// Clear the metadata slot only if `listener` still consumes it.
    ///
    /// A loop that exits after being replaced must not tear down its
    /// successor's channel.
    pub fn release_metadata(&mut self, listener: &MetadataStream) -> bool {
        let owned = self
            .metadata
            .as_ref()
            .is_some_and(|channel| channel.owns(listener));
        owned && self.unsubscribe_metadata()
    }

    pub fn is_subscribed_to_metadata(&self) -> bool {
        self.metadata.is_some()
    }

    pub fn metadata_publisher(&self) -> Option<Publisher<Metadata>> {
        self.metadata.as_ref().map(|channel| channel.publisher())
    }

    /// Close every live channel.
    pub fn close(&mut self) {
        self.unsubscribe_metadata();
    }
}
