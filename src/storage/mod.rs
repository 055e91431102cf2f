//! Storage module for persisting crawl state
//!
//! This module provides the backends behind the request frontier and the
//! handler dataset:
//! - In-memory stores (default, nothing survives the process)
//! - SQLite stores sharing one database file
//! - The [`Dataset`] handle handlers save records through

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::{MemoryFrontierStore, MemoryRecordSink};
pub use sqlite::{open_connection, SqliteFrontierStore, SqliteRecordSink};
pub use traits::{FrontierStore, Record, RecordSink, StorageError, StorageResult};

use crate::config::StorageConfig;
use crate::frontier::RequestFrontier;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Mutex;

/// Shared, lock-guarded record sink
pub struct Dataset {
    sink: Mutex<Box<dyn RecordSink>>,
}

impl Dataset {
    pub fn new(sink: impl RecordSink + 'static) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryRecordSink::new())
    }

    pub fn push(&self, data: Map<String, Value>) -> StorageResult<Record> {
        self.sink.lock().unwrap_or_else(|e| e.into_inner()).push(data)
    }

    pub fn all(&self) -> StorageResult<Vec<Record>> {
        self.sink.lock().unwrap_or_else(|e| e.into_inner()).all()
    }

    pub fn count(&self) -> StorageResult<usize> {
        self.sink.lock().unwrap_or_else(|e| e.into_inner()).count()
    }
}

impl Default for Dataset {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Opens the frontier and dataset described by the storage configuration
///
/// # Returns
///
/// SQLite-backed stores when `database-path` is set, in-memory stores
/// otherwise.
pub fn open_stores(config: &StorageConfig) -> StorageResult<(RequestFrontier, Dataset)> {
    match &config.database_path {
        Some(path) => {
            let path = Path::new(path);
            Ok((
                RequestFrontier::new(SqliteFrontierStore::open(path)?),
                Dataset::new(SqliteRecordSink::open(path)?),
            ))
        }
        None => Ok((RequestFrontier::in_memory(), Dataset::in_memory())),
    }
}
