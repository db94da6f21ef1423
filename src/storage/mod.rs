//! Storage module for persisting crawl data
//!
//! This module handles everything that touches the durable store:
//! - The `CheckpointStore` key/blob interface and its SQLite backend
//! - Loading and saving the checkpoint record
//! - Writing and reading result batches

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{SqliteStore, DEFAULT_MAX_RECORD_BYTES};
pub use traits::{CheckpointStore, StorageError, StorageResult};

use crate::state::{CrawlProgress, PageResult, BATCH_KEY_PREFIX, PROGRESS_KEY};
use std::path::Path;

/// Opens or creates the SQLite store at `path`
pub fn open_store(path: &Path, max_record_bytes: usize) -> StorageResult<SqliteStore> {
    SqliteStore::new(path, max_record_bytes)
}

/// Reads the checkpoint record, if one was ever written
pub fn load_progress(store: &dyn CheckpointStore) -> StorageResult<Option<CrawlProgress>> {
    match store.get(PROGRESS_KEY)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Writes the checkpoint record
pub fn save_progress(store: &dyn CheckpointStore, progress: &CrawlProgress) -> StorageResult<()> {
    let bytes = serde_json::to_vec(progress)?;
    store.put(PROGRESS_KEY, &bytes)
}

/// Writes one batch of results as a JSON array under `key`
pub fn save_batch(store: &dyn CheckpointStore, key: &str, pages: &[PageResult]) -> StorageResult<()> {
    let bytes = serde_json::to_vec(pages)?;
    store.put(key, &bytes)
}

/// Reads the batch stored under `key`
pub fn load_batch(store: &dyn CheckpointStore, key: &str) -> StorageResult<Option<Vec<PageResult>>> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Lists all batch keys in commit order
pub fn batch_keys(store: &dyn CheckpointStore) -> StorageResult<Vec<String>> {
    store.keys_with_prefix(BATCH_KEY_PREFIX)
}
