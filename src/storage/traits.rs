//! Storage traits and error types
//!
//! This module defines the trait interface for frontier and dataset
//! backends and associated error types.

use crate::model::{Request, RequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable backing for the request frontier
///
/// Implementations keep two collections: the ordered pending queue and the
/// set of handled request ids. The queue holds at most one entry per
/// identity; beyond that they do not deduplicate, and the frontier checks
/// [`FrontierStore::is_pending`] and [`FrontierStore::is_handled`] before
/// inserting.
pub trait FrontierStore: Send {
    /// Appends a request to the back of the pending queue
    ///
    /// A pending entry with the same identity is replaced.
    fn append(&mut self, request: &Request) -> StorageResult<()>;

    /// Inserts a request at the front of the pending queue, replacing any
    /// pending entry with the same identity
    fn push_front(&mut self, request: &Request) -> StorageResult<()>;

    /// Removes and returns the earliest pending request
    ///
    /// Entries that cannot be decoded are dropped and skipped.
    fn pop_front(&mut self) -> StorageResult<Option<Request>>;

    /// Records a request id as handled
    ///
    /// # Returns
    ///
    /// `true` if the id was newly recorded, `false` if it was already handled
    fn mark_handled(&mut self, id: RequestId) -> StorageResult<bool>;

    fn is_pending(&self, id: RequestId) -> StorageResult<bool>;

    fn is_handled(&self, id: RequestId) -> StorageResult<bool>;

    fn pending_count(&self) -> StorageResult<usize>;

    fn handled_count(&self) -> StorageResult<usize>;
}

/// A stored dataset entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            data,
        }
    }
}

/// Append-only sink for records produced by handlers
pub trait RecordSink: Send {
    /// Stores `data` under a freshly generated id and timestamp
    fn push(&mut self, data: Map<String, Value>) -> StorageResult<Record>;

    /// All records in insertion order
    fn all(&self) -> StorageResult<Vec<Record>>;

    fn count(&self) -> StorageResult<usize>;
}
