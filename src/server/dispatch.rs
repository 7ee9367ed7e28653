//! Streaming dispatch loop.
//!
//! Relays one subscription's events to the remote peer until the call ends,
//! the channel closes, or the peer goes away. No lock is held while waiting
//! or sending.

use super::context::CallContext;
use crate::error::Result;
use crate::subscriptions::{Listener, Next};
use crossbeam_channel::Sender;
use thiserror::Error;
use tracing::{debug, error};

/// Failure to hand a message to the transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Peer closed the stream. Terminates the loop cleanly.
    #[error("stream closed by peer")]
    Closed,

    /// Any other transport failure. Logged, the loop keeps going.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Outgoing half of a server-streaming call.
pub trait StreamSink<W> {
    fn send(&mut self, message: W) -> std::result::Result<(), SendError>;
}

impl<W, S: StreamSink<W> + ?Sized> StreamSink<W> for &mut S {
    fn send(&mut self, message: W) -> std::result::Result<(), SendError> {
        (**self).send(message)
    }
}

/// In-process sink: the receiving end going away means the peer closed.
impl<W> StreamSink<W> for Sender<W> {
    fn send(&mut self, message: W) -> std::result::Result<(), SendError> {
        Sender::send(self, message).map_err(|_| SendError::Closed)
    }
}

/// Why a dispatch loop terminated. Every variant is an orderly exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchExit {
    /// The call's context reported done.
    CallDone,
    /// The subscription channel was closed (unsubscribe, resubscribe or
    /// disconnect).
    ChannelClosed,
    /// The peer closed the stream.
    PeerClosed,
}

/// Run the loop for one subscription.
pub fn dispatch<E, W, S>(
    listener: &Listener<E, W>,
    ctx: &CallContext,
    sink: &mut S,
) -> Result<DispatchExit>
where
    S: StreamSink<W> + ?Sized,
{
    loop {
        match listener.recv_until(ctx.done()) {
            Next::Done => return Ok(DispatchExit::CallDone),
            Next::Closed => return Ok(DispatchExit::ChannelClosed),
            Next::Event(msg) => match sink.send(msg) {
                Ok(()) => {}
                Err(SendError::Closed) => {
                    debug!("peer closed subscription stream");
                    return Ok(DispatchExit::PeerClosed);
                }
                Err(err) => error!(error = %err, "sending message error"),
            },
        }
    }
}
