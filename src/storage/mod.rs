//! Contract with the metadata storage engine.
//!
//! The server only depends on [`MetadataStorage`]. Every call receives a
//! [`QueryContext`] that the engine should poll so an abandoned lookup stops
//! early. [`MemoryStorage`] is a reference engine used by tests and
//! embedded setups.

mod memory;

pub use memory::MemoryStorage;

use crate::types::{Metadata, Page};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Storage failures, already classified by the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("metadata not found: {0}")]
    NotFound(String),

    #[error("storage temporarily unavailable: {0}")]
    Transient(String),

    #[error("storage failure: {0}")]
    Fatal(String),

    #[error("storage call cancelled")]
    Cancelled,
}

/// Result type for storage calls.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Cancellation and deadline of one storage call.
#[derive(Clone, Debug)]
pub struct QueryContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl QueryContext {
    /// Context without a deadline.
    pub fn background() -> Self {
        Self {
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Abandon the call. Shared by every clone of this context.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once cancelled or past the deadline.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Fail with [`StorageError::Cancelled`] if the call was abandoned.
    pub fn check(&self) -> StorageResult<()> {
        if self.is_cancelled() {
            Err(StorageError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Read side of the metadata store.
pub trait MetadataStorage: Send + Sync {
    fn get_by_address(&self, ctx: &QueryContext, address: &str) -> StorageResult<Metadata>;

    fn list(&self, ctx: &QueryContext, page: &Page) -> StorageResult<Vec<Metadata>>;

    fn get_by_method_signature(
        &self,
        ctx: &QueryContext,
        signature: &str,
        page: &Page,
    ) -> StorageResult<Vec<Metadata>>;

    fn get_by_topic(
        &self,
        ctx: &QueryContext,
        topic: &str,
        page: &Page,
    ) -> StorageResult<Vec<Metadata>>;
}

/// Notified by the storage layer after every metadata write.
pub trait MetadataListener: Send + Sync {
    fn on_metadata(&self, metadata: &Metadata);
}
