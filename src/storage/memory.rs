//! In-memory metadata store.

use super::{MetadataListener, MetadataStorage, QueryContext, StorageError, StorageResult};
use crate::types::{Metadata, Page, SortOrder};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Page size used when a request asks for zero records.
pub const DEFAULT_PAGE_LIMIT: u64 = 10;

/// Largest page returned by a single listing call.
pub const MAX_PAGE_LIMIT: u64 = 100;

#[derive(Default)]
struct Inner {
    records: BTreeMap<u64, Metadata>,
    by_address: HashMap<String, u64>,
}

/// Metadata store kept in memory, ordered by record id.
///
/// Every successful [`save`](MemoryStorage::save) is reported to the
/// registered listeners after the write lock is released.
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
    listeners: RwLock<Vec<Arc<dyn MetadataListener>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn MetadataListener>) {
        self.listeners.write().push(listener);
    }

    /// Insert or replace a record, keyed by id, then notify listeners.
    pub fn save(&self, metadata: Metadata) {
        {
            let mut inner = self.inner.write();
            let stale = inner.records.get(&metadata.id).map(|m| m.address.clone());
            if let Some(address) = stale {
                inner.by_address.remove(&address);
            }
            inner
                .by_address
                .insert(metadata.address.clone(), metadata.id);
            inner.records.insert(metadata.id, metadata.clone());
        }

        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_metadata(&metadata);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    fn page_where<F>(
        &self,
        ctx: &QueryContext,
        page: &Page,
        filter: F,
    ) -> StorageResult<Vec<Metadata>>
    where
        F: Fn(&Metadata) -> bool,
    {
        ctx.check()?;
        let limit = match page.limit {
            0 => DEFAULT_PAGE_LIMIT,
            n => n.min(MAX_PAGE_LIMIT),
        } as usize;

        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);

        let inner = self.inner.read();
        let matching = inner.records.values().filter(|m| filter(m));
        let records: Vec<Metadata> = match page.order {
            SortOrder::Asc => matching
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
            SortOrder::Desc => matching
                .rev()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
        };
        Ok(records)
    }
}

impl MetadataStorage for MemoryStorage {
    fn get_by_address(&self, ctx: &QueryContext, address: &str) -> StorageResult<Metadata> {
        ctx.check()?;
        let inner = self.inner.read();
        inner
            .by_address
            .get(address)
            .and_then(|id| inner.records.get(id))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(address.to_string()))
    }

    fn list(&self, ctx: &QueryContext, page: &Page) -> StorageResult<Vec<Metadata>> {
        self.page_where(ctx, page, |_| true)
    }

    fn get_by_method_signature(
        &self,
        ctx: &QueryContext,
        signature: &str,
        page: &Page,
    ) -> StorageResult<Vec<Metadata>> {
        self.page_where(ctx, page, |m| m.signatures.iter().any(|s| s == signature))
    }

    fn get_by_topic(
        &self,
        ctx: &QueryContext,
        topic: &str,
        page: &Page,
    ) -> StorageResult<Vec<Metadata>> {
        self.page_where(ctx, page, |m| m.topics.iter().any(|t| t == topic))
    }
}
