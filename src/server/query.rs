//! Storage calls made on behalf of unary handlers.

use crate::error::{Result, ServerError};
use crate::storage::{QueryContext, StorageError, StorageResult};
use crossbeam_channel::{after, bounded, never, select, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Run a storage call on behalf of a caller.
///
/// The call runs on a helper thread and is abandoned as soon as the caller's
/// `done` signal fires or `timeout` (if any) elapses. Either way its
/// [`QueryContext`] is cancelled and the result is dropped. A finished call
/// yields [`StorageError::Cancelled`], an elapsed timeout
/// [`ServerError::Timeout`]. Nothing is retried.
pub fn run_query<T, F>(done: &Receiver<()>, timeout: Option<Duration>, call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&QueryContext) -> StorageResult<T> + Send + 'static,
{
    let ctx = match timeout {
        Some(timeout) => QueryContext::with_timeout(timeout),
        None => QueryContext::background(),
    };
    if is_disconnected(done) {
        return Err(StorageError::Cancelled.into());
    }

    let worker_ctx = ctx.clone();
    let (tx, rx) = bounded(1);
    thread::Builder::new()
        .name("metadata-lookup".to_string())
        .spawn(move || {
            let _ = tx.send(call(&worker_ctx));
        })?;

    let deadline = timeout.map(after).unwrap_or_else(never);
    select! {
        recv(rx) -> result => match result {
            Ok(result) => Ok(result?),
            Err(_) => Err(StorageError::Fatal(
                "lookup worker exited without a result".to_string(),
            )
            .into()),
        },
        recv(done) -> _ => {
            ctx.cancel();
            debug!("caller went away, storage call abandoned");
            Err(StorageError::Cancelled.into())
        },
        recv(deadline) -> _ => {
            ctx.cancel();
            let timeout = timeout.unwrap_or_default();
            warn!(?timeout, "storage lookup timed out");
            Err(ServerError::Timeout(timeout))
        },
    }
}

fn is_disconnected(done: &Receiver<()>) -> bool {
    matches!(done.try_recv(), Err(TryRecvError::Disconnected))
}
