//! Per-call execution context.

use crate::error::{Result, ServerError};
use crate::types::ClientId;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

/// Context the transport attaches to every call.
///
/// Carries the caller's connection identity and a done signal that fires
/// when the call ends (client cancel or disconnect).
pub struct CallContext {
    client_id: Option<ClientId>,
    done: Receiver<()>,
}

/// Transport-side end of a call. Dropping it, or calling
/// [`finish`](CallHandle::finish), marks the call as done.
pub struct CallHandle {
    _done: Sender<()>,
}

impl CallHandle {
    pub fn finish(self) {}
}

impl CallContext {
    pub fn new(client_id: Option<ClientId>) -> (Self, CallHandle) {
        let (tx, rx) = bounded(0);
        (
            Self {
                client_id,
                done: rx,
            },
            CallHandle { _done: tx },
        )
    }

    /// Context of a call made outside any connection.
    pub fn detached() -> (Self, CallHandle) {
        Self::new(None)
    }

    /// Identity of the calling connection.
    pub fn client_id(&self) -> Result<&ClientId> {
        self.client_id.as_ref().ok_or(ServerError::UnknownClient)
    }

    /// Disconnects when the call is over.
    pub fn done(&self) -> &Receiver<()> {
        &self.done
    }

    pub fn is_done(&self) -> bool {
        matches!(self.done.try_recv(), Err(TryRecvError::Disconnected))
    }
}
