//! Statistics generation from the checkpoint store
//!
//! This module provides functionality for summarizing what a crawl has
//! committed so far: the checkpoint record and the stored batches.

use crate::state::{parse_batch_key, CrawlProgress, FailureKind};
use crate::storage::{batch_keys, load_batch, load_progress, CheckpointStore};
use crate::CrawlError;
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Checkpoint record, if one was written
    pub progress: Option<CrawlProgress>,

    /// Number of batch records in the store
    pub batches: u64,

    /// Highest batch ordinal in the store
    pub last_batch: Option<u64>,

    /// Page results across all stored batches
    pub pages_stored: u64,

    /// Page results carrying a failure
    pub failures: u64,

    /// Failure count per failure kind
    pub failures_by_kind: HashMap<FailureKind, u64>,
}

impl CrawlStatistics {
    /// Stored pages the checkpoint does not count yet
    ///
    /// Non-zero only when a run died between a batch write and its
    /// checkpoint write.
    pub fn uncounted_pages(&self) -> u64 {
        let counted = self
            .progress
            .as_ref()
            .map_or(0, |p| p.pages_completed_count);
        self.pages_stored.saturating_sub(counted)
    }
}

/// Loads statistics from the store
pub fn load_statistics(store: &dyn CheckpointStore) -> Result<CrawlStatistics, CrawlError> {
    let mut stats = CrawlStatistics {
        progress: load_progress(store)?,
        ..CrawlStatistics::default()
    };

    let keys = batch_keys(store)?;
    stats.last_batch = keys.iter().filter_map(|key| parse_batch_key(key)).max();

    for key in keys {
        let Some(pages) = load_batch(store, &key)? else {
            continue;
        };
        stats.batches += 1;
        stats.pages_stored += pages.len() as u64;

        for failure in pages.iter().filter_map(|p| p.failure.as_ref()) {
            stats.failures += 1;
            *stats.failures_by_kind.entry(failure.kind).or_insert(0) += 1;
        }
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Checkpoint:");
    match &stats.progress {
        Some(progress) => {
            println!("  Pages completed: {}", progress.pages_completed_count);
            println!("  Batches written: {}", progress.batches_written_count);
            if let Some(fingerprint) = &progress.input_fingerprint {
                println!("  Input fingerprint: {}", fingerprint);
            }
        }
        None => println!("  (none)"),
    }
    println!();

    println!("Stored Results:");
    println!("  Batches: {}", stats.batches);
    if let Some(last) = stats.last_batch {
        println!("  Last batch: {}", last);
    }
    println!("  Pages: {}", stats.pages_stored);
    if stats.uncounted_pages() > 0 {
        println!(
            "  Pages not yet counted by the checkpoint: {}",
            stats.uncounted_pages()
        );
    }
    println!();

    if !stats.failures_by_kind.is_empty() {
        println!("Failures by Kind:");
        let mut failure_counts: Vec<_> = stats.failures_by_kind.iter().collect();
        failure_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (kind, count) in failure_counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    let succeeded = stats.pages_stored - stats.failures;
    let success_rate = if stats.pages_stored > 0 {
        (succeeded as f64 / stats.pages_stored as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} pages loaded without failure)",
        success_rate, succeeded, stats.pages_stored
    );
}
