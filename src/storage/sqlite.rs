//! SQLite storage implementation
//!
//! This module provides SQLite-based implementations of the
//! [`FrontierStore`] and [`RecordSink`] traits. Both can point at the same
//! database file; each opens its own connection.

use crate::model::{Request, RequestId};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{FrontierStore, Record, RecordSink, StorageResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// Opens (or creates) a database file with the schema in place
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(Connection)` - Successfully opened/created database
/// * `Err(StorageError)` - Failed to open database
pub fn open_connection(path: &Path) -> StorageResult<Connection> {
    let conn = Connection::open(path)?;

    // Configure SQLite for better performance
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
        PRAGMA busy_timeout = 5000;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}

fn open_in_memory_connection() -> StorageResult<Connection> {
    let conn = Connection::open_in_memory()?;
    initialize_schema(&conn)?;
    Ok(conn)
}

/// Frontier store backed by the `frontier` and `handled` tables
pub struct SqliteFrontierStore {
    conn: Connection,
}

impl SqliteFrontierStore {
    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self {
            conn: open_connection(path)?,
        })
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self {
            conn: open_in_memory_connection()?,
        })
    }

    /// Inserts `request`, replacing any pending row with the same identity
    fn insert_at(&mut self, request: &Request, position_sql: &str) -> StorageResult<()> {
        let payload = serde_json::to_string(request)?;
        let request_id = request.id().to_string();
        let sql = format!(
            "INSERT INTO frontier (position, request_id, payload) VALUES (({}), ?1, ?2)",
            position_sql
        );

        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM frontier WHERE request_id = ?1",
            params![request_id],
        )?;
        tx.execute(&sql, params![request_id, payload])?;
        tx.commit()?;
        Ok(())
    }
}

impl FrontierStore for SqliteFrontierStore {
    fn append(&mut self, request: &Request) -> StorageResult<()> {
        self.insert_at(request, "SELECT COALESCE(MAX(position), 0) + 1 FROM frontier")
    }

    fn push_front(&mut self, request: &Request) -> StorageResult<()> {
        self.insert_at(request, "SELECT COALESCE(MIN(position), 0) - 1 FROM frontier")
    }

    fn pop_front(&mut self) -> StorageResult<Option<Request>> {
        let tx = self.conn.transaction()?;

        let popped = loop {
            let row: Option<(i64, String)> = tx
                .query_row(
                    "SELECT position, payload FROM frontier ORDER BY position LIMIT 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((position, payload)) = row else {
                break None;
            };

            tx.execute("DELETE FROM frontier WHERE position = ?1", params![position])?;

            match serde_json::from_str::<Request>(&payload) {
                Ok(request) => break Some(request),
                Err(e) => debug!("Skipping corrupt frontier row {}: {}", position, e),
            }
        };

        tx.commit()?;
        Ok(popped)
    }

    fn mark_handled(&mut self, id: RequestId) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO handled (request_id, handled_at) VALUES (?1, ?2)",
            params![id.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(inserted == 1)
    }

    fn is_pending(&self, id: RequestId) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM frontier WHERE request_id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn is_handled(&self, id: RequestId) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM handled WHERE request_id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn pending_count(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM frontier", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn handled_count(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM handled", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Record sink backed by the `records` table
pub struct SqliteRecordSink {
    conn: Connection,
}

impl SqliteRecordSink {
    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self {
            conn: open_connection(path)?,
        })
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self {
            conn: open_in_memory_connection()?,
        })
    }
}

impl RecordSink for SqliteRecordSink {
    fn push(&mut self, data: Map<String, Value>) -> StorageResult<Record> {
        let record = Record::new(data);
        self.conn.execute(
            "INSERT INTO records (id, created_at, data) VALUES (?1, ?2, ?3)",
            params![
                record.id.to_string(),
                record.created_at.to_rfc3339(),
                serde_json::to_string(&record.data)?
            ],
        )?;
        Ok(record)
    }

    fn all(&self) -> StorageResult<Vec<Record>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, created_at, data FROM records ORDER BY seq")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let records = rows
            .into_iter()
            .filter_map(|(id, created_at, data)| match decode_record(&id, &created_at, &data) {
                Some(record) => Some(record),
                None => {
                    debug!("Skipping corrupt record row {}", id);
                    None
                }
            })
            .collect();

        Ok(records)
    }

    fn count(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn decode_record(id: &str, created_at: &str, data: &str) -> Option<Record> {
    Some(Record {
        id: Uuid::parse_str(id).ok()?,
        created_at: DateTime::parse_from_rfc3339(created_at)
            .ok()?
            .with_timezone(&Utc),
        data: serde_json::from_str(data).ok()?,
    })
}
