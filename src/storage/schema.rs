//! Database schema definitions
//!
//! This module contains the SQL schema for the frontier and dataset tables.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Pending requests, ordered by position (front insertions go below the minimum)
CREATE TABLE IF NOT EXISTS frontier (
    position INTEGER PRIMARY KEY,
    request_id TEXT NOT NULL UNIQUE,
    payload TEXT NOT NULL
);

-- Identities of requests that reached a terminal outcome
CREATE TABLE IF NOT EXISTS handled (
    request_id TEXT PRIMARY KEY,
    handled_at TEXT NOT NULL
);

-- Records saved by handlers
CREATE TABLE IF NOT EXISTS records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    data TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
