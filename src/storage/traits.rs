//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint store backends and
//! associated error types.

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record {key} is {size} bytes, above the store limit of {limit} bytes")]
    PayloadTooLarge {
        key: String,
        size: usize,
        limit: usize,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    /// Returns true if retrying the same write can never succeed
    pub fn is_non_recoverable(&self) -> bool {
        matches!(self, Self::PayloadTooLarge { .. })
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable key → blob storage
///
/// Used both for the checkpoint record and for committed result batches.
/// A successful `put` must be durable before it returns: the flush protocol
/// relies on a batch being stored before the checkpoint that counts it.
pub trait CheckpointStore: Send + Sync {
    /// Reads the value stored under `key`
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value
    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Lists keys starting with `prefix`, in ascending order
    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Removes every record
    fn clear(&self) -> StorageResult<()>;
}
