//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CheckpointStore trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Default per-record size limit (9 MiB)
pub const DEFAULT_MAX_RECORD_BYTES: usize = 9 * 1024 * 1024;

/// SQLite checkpoint store backend
pub struct SqliteStore {
    conn: Mutex<Connection>,
    max_record_bytes: usize,
}

impl SqliteStore {
    /// Opens or creates the store at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `max_record_bytes` - Largest value a single `put` accepts
    pub fn new(path: &Path, max_record_bytes: usize) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Every put must be on disk before the checkpoint moves past it
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            max_record_bytes,
        })
    }

    /// Creates an in-memory store (for tests and dry runs)
    pub fn new_in_memory(max_record_bytes: usize) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_record_bytes,
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection lock poisoned".to_string()))
    }
}

impl CheckpointStore for SqliteStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM records WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        if value.len() > self.max_record_bytes {
            return Err(StorageError::PayloadTooLarge {
                key: key.to_string(),
                size: value.len(),
                limit: self.max_record_bytes,
            });
        }

        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO records (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM records WHERE substr(key, 1, ?1) = ?2 ORDER BY key")?;
        let rows = stmt.query_map(params![prefix.len() as i64, prefix], |row| row.get(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }

        Ok(keys)
    }

    fn clear(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM records", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_in_memory() {
        let store = SqliteStore::new_in_memory(DEFAULT_MAX_RECORD_BYTES);
        assert!(store.is_ok());
    }

    #[test]
    fn test_get_missing_key() {
        let store = SqliteStore::new_in_memory(DEFAULT_MAX_RECORD_BYTES).unwrap();
        assert_eq!(store.get("STATE").unwrap(), None);
    }

    #[test]
    fn test_put_then_get() {
        let store = SqliteStore::new_in_memory(DEFAULT_MAX_RECORD_BYTES).unwrap();
        store.put("STATE", b"{\"pageCount\":1}").unwrap();
        assert_eq!(
            store.get("STATE").unwrap().as_deref(),
            Some(&b"{\"pageCount\":1}"[..])
        );
    }

    #[test]
    fn test_put_replaces_existing() {
        let store = SqliteStore::new_in_memory(DEFAULT_MAX_RECORD_BYTES).unwrap();
        store.put("STATE", b"one").unwrap();
        store.put("STATE", b"two").unwrap();
        assert_eq!(store.get("STATE").unwrap().as_deref(), Some(&b"two"[..]));
    }

    #[test]
    fn test_payload_too_large_is_rejected() {
        let store = SqliteStore::new_in_memory(4).unwrap();
        let err = store.put("PAGES-000000001", b"12345").unwrap_err();

        assert!(err.is_non_recoverable());
        assert!(matches!(
            err,
            StorageError::PayloadTooLarge { size: 5, limit: 4, .. }
        ));
        assert_eq!(store.get("PAGES-000000001").unwrap(), None);
    }

    #[test]
    fn test_keys_with_prefix_are_sorted() {
        let store = SqliteStore::new_in_memory(DEFAULT_MAX_RECORD_BYTES).unwrap();
        store.put("PAGES-000000002", b"[]").unwrap();
        store.put("STATE", b"{}").unwrap();
        store.put("PAGES-000000001", b"[]").unwrap();
        store.put("PAGES_OTHER", b"[]").unwrap();

        let keys = store.keys_with_prefix("PAGES-").unwrap();
        assert_eq!(keys, vec!["PAGES-000000001", "PAGES-000000002"]);
    }

    #[test]
    fn test_clear_removes_everything() {
        let store = SqliteStore::new_in_memory(DEFAULT_MAX_RECORD_BYTES).unwrap();
        store.put("STATE", b"{}").unwrap();
        store.put("PAGES-000000001", b"[]").unwrap();

        store.clear().unwrap();

        assert_eq!(store.get("STATE").unwrap(), None);
        assert!(store.keys_with_prefix("").unwrap().is_empty());
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.db");

        {
            let store = SqliteStore::new(&path, DEFAULT_MAX_RECORD_BYTES).unwrap();
            store.put("STATE", b"persisted").unwrap();
        }

        let reopened = SqliteStore::new(&path, DEFAULT_MAX_RECORD_BYTES).unwrap();
        assert_eq!(reopened.get("STATE").unwrap().as_deref(), Some(&b"persisted"[..]));
    }
}
