//! In-memory storage backends
//!
//! Used when no database path is configured, and throughout the tests.

use crate::model::{Request, RequestId};
use crate::storage::traits::{FrontierStore, Record, RecordSink, StorageResult};
use serde_json::{Map, Value};
use std::collections::{HashSet, VecDeque};

/// Frontier store holding everything in process memory
#[derive(Debug, Default)]
pub struct MemoryFrontierStore {
    pending: VecDeque<Request>,
    handled: HashSet<RequestId>,
}

impl MemoryFrontierStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn remove_pending(&mut self, id: RequestId) {
        self.pending.retain(|request| request.id() != id);
    }
}

impl FrontierStore for MemoryFrontierStore {
    fn append(&mut self, request: &Request) -> StorageResult<()> {
        self.remove_pending(request.id());
        self.pending.push_back(request.clone());
        Ok(())
    }

    fn push_front(&mut self, request: &Request) -> StorageResult<()> {
        self.remove_pending(request.id());
        self.pending.push_front(request.clone());
        Ok(())
    }

    fn pop_front(&mut self) -> StorageResult<Option<Request>> {
        Ok(self.pending.pop_front())
    }

    fn mark_handled(&mut self, id: RequestId) -> StorageResult<bool> {
        Ok(self.handled.insert(id))
    }

    fn is_pending(&self, id: RequestId) -> StorageResult<bool> {
        Ok(self.pending.iter().any(|request| request.id() == id))
    }

    fn is_handled(&self, id: RequestId) -> StorageResult<bool> {
        Ok(self.handled.contains(&id))
    }

    fn pending_count(&self) -> StorageResult<usize> {
        Ok(self.pending.len())
    }

    fn handled_count(&self) -> StorageResult<usize> {
        Ok(self.handled.len())
    }
}

/// Record sink holding everything in process memory
#[derive(Debug, Default)]
pub struct MemoryRecordSink {
    records: Vec<Record>,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordSink for MemoryRecordSink {
    fn push(&mut self, data: Map<String, Value>) -> StorageResult<Record> {
        let record = Record::new(data);
        self.records.push(record.clone());
        Ok(record)
    }

    fn all(&self) -> StorageResult<Vec<Record>> {
        Ok(self.records.clone())
    }

    fn count(&self) -> StorageResult<usize> {
        Ok(self.records.len())
    }
}
