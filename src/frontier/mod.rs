//! Request frontier
//!
//! The frontier is the crawl's work queue: pending requests in FIFO order
//! plus the set of request ids that already reached a terminal outcome.
//! Persistence is delegated to a [`FrontierStore`]; the frontier itself
//! only coordinates, serializing every operation behind one lock.

use crate::model::{Request, RequestId};
use crate::storage::{FrontierStore, MemoryFrontierStore, StorageResult};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Frontier counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrontierInfo {
    pub pending_count: usize,
    pub handled_count: usize,
    pub total_count: usize,
}

/// Deduplicated, retry-aware request queue
pub struct RequestFrontier {
    store: Mutex<Box<dyn FrontierStore>>,
}

impl RequestFrontier {
    pub fn new(store: impl FrontierStore + 'static) -> Self {
        Self {
            store: Mutex::new(Box::new(store)),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryFrontierStore::new())
    }

    fn store(&self) -> MutexGuard<'_, Box<dyn FrontierStore>> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues a request at the back
    ///
    /// Deduplication is by identity: a request whose id is already pending
    /// or handled is rejected, while a different request for the same URL
    /// is accepted.
    ///
    /// # Returns
    ///
    /// `true` if the request was queued
    pub fn add(&self, request: Request) -> StorageResult<bool> {
        let mut store = self.store();
        let id = request.id();

        if store.is_pending(id)? || store.is_handled(id)? {
            debug!("Request {} already known, not queued", id);
            return Ok(false);
        }

        store.append(&request)?;
        Ok(true)
    }

    /// Queues several requests, returning how many were accepted
    pub fn add_all(&self, requests: impl IntoIterator<Item = Request>) -> StorageResult<usize> {
        let mut accepted = 0;
        for request in requests {
            if self.add(request)? {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    /// Removes and returns the earliest pending request
    pub fn next(&self) -> StorageResult<Option<Request>> {
        self.store().pop_front()
    }

    /// Returns a failed request to the front of the queue
    ///
    /// The request's retry counter is incremented first.
    pub fn reclaim(&self, mut request: Request) -> StorageResult<()> {
        request.increment_retry();
        debug!(
            "Reclaiming {} (retry {})",
            request.url(),
            request.retry_count()
        );
        self.store().push_front(&request)
    }

    /// Records a request as finished
    ///
    /// # Returns
    ///
    /// `false` if the id was already handled
    pub fn mark_handled(&self, id: RequestId) -> StorageResult<bool> {
        self.store().mark_handled(id)
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.store().pending_count()? == 0)
    }

    pub fn info(&self) -> StorageResult<FrontierInfo> {
        let store = self.store();
        let pending_count = store.pending_count()?;
        let handled_count = store.handled_count()?;
        Ok(FrontierInfo {
            pending_count,
            handled_count,
            total_count: pending_count + handled_count,
        })
    }
}

impl Default for RequestFrontier {
    fn default() -> Self {
        Self::in_memory()
    }
}
