//! Database schema definitions
//!
//! This module contains the SQL schema for the checkpoint store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Named durable records: the checkpoint and one row per result batch
CREATE TABLE IF NOT EXISTS records (
    key TEXT PRIMARY KEY NOT NULL,
    value BLOB NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
