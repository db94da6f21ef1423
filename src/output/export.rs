//! Export of committed page results
//!
//! Concatenates every stored batch in key order and writes the pages as a
//! single pretty-printed JSON array.

use crate::state::PageResult;
use crate::storage::{batch_keys, load_batch, CheckpointStore};
use crate::CrawlError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// All stored page results, in batch order
pub fn collect_results(store: &dyn CheckpointStore) -> Result<Vec<PageResult>, CrawlError> {
    let mut pages = Vec::new();
    for key in batch_keys(store)? {
        if let Some(batch) = load_batch(store, &key)? {
            pages.extend(batch);
        }
    }
    Ok(pages)
}

/// Writes all stored page results to `path` and returns how many were written
pub fn export_results(store: &dyn CheckpointStore, path: &Path) -> Result<usize, CrawlError> {
    let pages = collect_results(store)?;

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &pages)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    tracing::info!("Exported {} pages to {}", pages.len(), path.display());
    Ok(pages.len())
}
