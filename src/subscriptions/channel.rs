//! Single-producer/single-consumer event channel.
//!
//! An [`EventChannel`] buffers internal events of type `E` and hands them to
//! its one [`Listener`] converted into the wire type `W`. Conversion happens
//! at delivery time, not at publish time.
//!
//! Publishing never blocks. When the buffer is full the *new* event is
//! dropped and counted; already buffered events keep their place so the
//! consumer still sees a gap-free prefix in publish order.

use crossbeam_channel::{bounded, never, select, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// Converts an internal event into its wire representation.
pub type Converter<E, W> = Arc<dyn Fn(E) -> W + Send + Sync>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel is closed")]
    Closed,

    #[error("channel already has an active listener")]
    AlreadyListening,
}

/// Outcome of [`Publisher::publish`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Publish {
    /// Event was buffered for the listener.
    Delivered,
    /// Buffer was full, the event was discarded.
    Dropped,
    /// Channel was closed, the event was discarded.
    Closed,
}

/// Outcome of waiting on a listener and a call's done signal together.
#[derive(Debug)]
pub enum Next<W> {
    Event(W),
    Closed,
    Done,
}

/// State shared by the channel and all of its handles.
struct Shared {
    closed: AtomicBool,
    listening: AtomicBool,
    dropped: AtomicU64,
}

/// Bounded event channel with lazy conversion to the wire type.
pub struct EventChannel<E, W> {
    sender: Sender<E>,
    receiver: Receiver<E>,
    converter: Converter<E, W>,
    shared: Arc<Shared>,
    /// Dropped on close, which wakes a blocked listener.
    shutdown: Option<Sender<()>>,
    shutdown_rx: Receiver<()>,
    capacity: usize,
}

impl<E, W> EventChannel<E, W> {
    /// Create a channel buffering at most `capacity` events.
    pub fn new<F>(capacity: usize, converter: F) -> Self
    where
        F: Fn(E) -> W + Send + Sync + 'static,
    {
        let (sender, receiver) = bounded(capacity);
        let (shutdown, shutdown_rx) = bounded(0);

        Self {
            sender,
            receiver,
            converter: Arc::new(converter),
            shared: Arc::new(Shared {
                closed: AtomicBool::new(false),
                listening: AtomicBool::new(false),
                dropped: AtomicU64::new(0),
            }),
            shutdown: Some(shutdown),
            shutdown_rx,
            capacity,
        }
    }

    /// Producer-side handle. Cheap to clone, safe to use from any thread.
    pub fn publisher(&self) -> Publisher<E> {
        Publisher {
            sender: self.sender.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Publish directly through the channel.
    pub fn publish(&self, event: E) -> Publish {
        self.publisher().publish(event)
    }

    /// Attach the single consumer.
    ///
    /// Fails if another listener is still alive. Once that listener is
    /// dropped the channel can be listened to again.
    pub fn listen(&self) -> Result<Listener<E, W>, ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        if self
            .shared
            .listening
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ChannelError::AlreadyListening);
        }

        Ok(Listener {
            receiver: self.receiver.clone(),
            shutdown: self.shutdown_rx.clone(),
            converter: Arc::clone(&self.converter),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Close the channel. Idempotent.
    ///
    /// Buffered events are discarded, a blocked listener wakes up with
    /// [`ChannelError::Closed`] and later publishes report [`Publish::Closed`].
    pub fn close(&mut self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.take();
        let discarded = self.receiver.try_iter().count();
        if discarded > 0 {
            trace!(discarded, "discarded buffered events on close");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Events currently buffered.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events discarded because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Whether `listener` consumes this channel.
    pub fn owns(&self, listener: &Listener<E, W>) -> bool {
        Arc::ptr_eq(&self.shared, &listener.shared)
    }
}

impl<E, W> Drop for EventChannel<E, W> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Producer handle of an [`EventChannel`].
pub struct Publisher<E> {
    sender: Sender<E>,
    shared: Arc<Shared>,
}

impl<E> Clone for Publisher<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E> Publisher<E> {
    /// Offer an event without blocking. Drops it if the buffer is full.
    pub fn publish(&self, event: E) -> Publish {
        if self.shared.closed.load(Ordering::Acquire) {
            return Publish::Closed;
        }
        match self.sender.try_send(event) {
            Ok(()) => Publish::Delivered,
            Err(TrySendError::Full(_)) => {
                let dropped = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(dropped, "subscription buffer full, dropping event");
                Publish::Dropped
            }
            Err(TrySendError::Disconnected(_)) => Publish::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

/// Consumer handle of an [`EventChannel`].
///
/// Yields converted events in publish order. Also usable as a blocking
/// [`Iterator`] that ends when the channel closes.
pub struct Listener<E, W> {
    receiver: Receiver<E>,
    shutdown: Receiver<()>,
    converter: Converter<E, W>,
    shared: Arc<Shared>,
}

impl<E, W> Listener<E, W> {
    /// Block until the next event arrives or the channel closes.
    pub fn recv(&self) -> Result<W, ChannelError> {
        match self.recv_until(&never()) {
            Next::Event(msg) => Ok(msg),
            Next::Closed | Next::Done => Err(ChannelError::Closed),
        }
    }

    /// Wait for an event, giving up after `timeout`.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<W>, ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        select! {
            recv(self.receiver) -> event => self.deliver(event.ok()).map(Some),
            recv(self.shutdown) -> _ => Err(ChannelError::Closed),
            default(timeout) => Ok(None),
        }
    }

    /// Wait for whichever comes first: an event, channel closure, or `done`
    /// firing (a message or its sender going away).
    pub fn recv_until(&self, done: &Receiver<()>) -> Next<W> {
        if self.is_closed() {
            return Next::Closed;
        }
        select! {
            recv(done) -> _ => Next::Done,
            recv(self.shutdown) -> _ => Next::Closed,
            recv(self.receiver) -> event => match self.deliver(event.ok()) {
                Ok(msg) => Next::Event(msg),
                Err(_) => Next::Closed,
            },
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    fn deliver(&self, event: Option<E>) -> Result<W, ChannelError> {
        // A close racing with the receive wins.
        match event {
            Some(event) if !self.is_closed() => Ok((self.converter)(event)),
            _ => Err(ChannelError::Closed),
        }
    }
}

impl<E, W> Iterator for Listener<E, W> {
    type Item = W;

    fn next(&mut self) -> Option<W> {
        self.recv().ok()
    }
}

impl<E, W> Drop for Listener<E, W> {
    fn drop(&mut self) {
        self.shared.listening.store(false, Ordering::Release);
    }
}
