//! Flush coordination
//!
//! Moves buffered page results into the checkpoint store. Only one flush runs
//! at a time; a caller that finds a flush in progress returns immediately
//! instead of waiting. Each flush writes its batch first and only then the
//! advanced checkpoint record, so a crash between the two writes leaves a
//! stored batch the checkpoint does not count yet, never the reverse.

use crate::config::{CrawlerConfig, OnFlushError};
use crate::crawler::buffer::ResultBuffer;
use crate::state::{CrawlProgress, PageResult};
use crate::storage::{save_batch, save_progress, CheckpointStore};
use crate::CrawlError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// When to flush and what to do when a non-forced flush fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Buffered page count that triggers a non-forced flush
    pub threshold: usize,
    pub on_error: OnFlushError,
}

impl FlushPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            threshold: config.flush_threshold as usize,
            on_error: config.on_flush_error,
        }
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Result of one `maybe_flush` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Skipped(SkipReason),
    /// Batches written during this call and the pages they held
    Flushed { batches: usize, pages: usize },
    /// A non-forced flush failed; the error was logged
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    BelowThreshold,
    InFlight,
}

/// Why a single batch commit failed
enum CommitError {
    /// Nothing was stored; the pages are handed back
    Batch {
        source: CrawlError,
        pages: Vec<PageResult>,
    },
    /// The batch is stored but the checkpoint record is not
    Progress(CrawlError),
}

impl CommitError {
    fn into_parts(self) -> (CrawlError, Option<Vec<PageResult>>) {
        match self {
            Self::Batch { source, pages } => (source, Some(pages)),
            Self::Progress(source) => (source, None),
        }
    }
}

/// Clears the in-flight flag when the flush ends, however it ends
struct FlushGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlushGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Owns the checkpoint and serializes flushes of the result buffer
pub struct FlushCoordinator {
    store: Arc<dyn CheckpointStore>,
    buffer: Arc<ResultBuffer>,
    progress: Mutex<CrawlProgress>,
    flushing: AtomicBool,
    policy: FlushPolicy,
}

impl FlushCoordinator {
    /// Creates a coordinator continuing from `progress`
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        buffer: Arc<ResultBuffer>,
        progress: CrawlProgress,
        policy: FlushPolicy,
    ) -> Self {
        Self {
            store,
            buffer,
            progress: Mutex::new(progress),
            flushing: AtomicBool::new(false),
            policy,
        }
    }

    pub fn buffer(&self) -> &Arc<ResultBuffer> {
        &self.buffer
    }

    /// Copy of the current checkpoint
    pub fn progress(&self) -> CrawlProgress {
        self.lock_progress().clone()
    }

    /// Flushes the buffer if it is due
    ///
    /// A non-forced call is a no-op below the threshold. Any call is a no-op
    /// on an empty buffer or while another flush is in flight. Once a flush
    /// starts it keeps committing batches while the buffer stays at or above
    /// the threshold, so results appended during a slow write are not left
    /// behind.
    ///
    /// Errors are returned for forced flushes and for store failures no retry
    /// can fix. A failed non-forced flush is logged and reported as
    /// `FlushOutcome::Failed`.
    pub async fn maybe_flush(&self, force: bool) -> Result<FlushOutcome, CrawlError> {
        let pending = self.buffer.len();
        if pending == 0 {
            return Ok(FlushOutcome::Skipped(SkipReason::Empty));
        }
        if !force && pending < self.policy.threshold {
            return Ok(FlushOutcome::Skipped(SkipReason::BelowThreshold));
        }

        let Some(_guard) = FlushGuard::acquire(&self.flushing) else {
            debug!("Flush already in progress, skipping");
            return Ok(FlushOutcome::Skipped(SkipReason::InFlight));
        };

        let mut batches = 0;
        let mut pages = 0;
        loop {
            let snapshot = self.buffer.snapshot_and_clear();
            if snapshot.is_empty() {
                break;
            }
            let count = snapshot.len();

            if let Err(failure) = self.commit(snapshot).await {
                return self.handle_failure(failure, force);
            }
            batches += 1;
            pages += count;

            if self.buffer.len() < self.policy.threshold.max(1) {
                break;
            }
        }

        if batches == 0 {
            return Ok(FlushOutcome::Skipped(SkipReason::Empty));
        }
        Ok(FlushOutcome::Flushed { batches, pages })
    }

    /// Writes one snapshot as the next batch, then advances the checkpoint
    async fn commit(&self, pages: Vec<PageResult>) -> Result<(), CommitError> {
        let key = self.lock_progress().next_batch_key();
        let count = pages.len();

        let store = Arc::clone(&self.store);
        let batch_key = key.clone();
        let written = tokio::task::spawn_blocking(move || {
            let result = save_batch(store.as_ref(), &batch_key, &pages);
            (pages, result)
        })
        .await;

        match written {
            Ok((_, Ok(()))) => {}
            Ok((pages, Err(e))) => {
                return Err(CommitError::Batch {
                    source: e.into(),
                    pages,
                })
            }
            // The pages moved into the panicked task and cannot be handed back
            Err(e) => {
                return Err(CommitError::Batch {
                    source: CrawlError::Worker(e.to_string()),
                    pages: Vec::new(),
                })
            }
        }

        // The batch is durable, so the pages count as completed from here on
        // even if the checkpoint write below fails
        let progress = {
            let mut progress = self.lock_progress();
            progress.record_batch(count);
            progress.clone()
        };

        info!(
            "Storing {} pages to {} (total pages crawled: {})",
            count, key, progress.pages_completed_count
        );

        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || save_progress(store.as_ref(), &progress))
            .await
            .map_err(|e| CommitError::Progress(CrawlError::Worker(e.to_string())))?
            .map_err(|e| CommitError::Progress(e.into()))
    }

    fn handle_failure(&self, failure: CommitError, force: bool) -> Result<FlushOutcome, CrawlError> {
        let (error, pages) = failure.into_parts();

        if error.is_non_recoverable() {
            error!("Checkpoint store rejected a batch, lower the flush threshold: {}", error);
            return Err(error);
        }
        if force {
            return Err(error);
        }

        warn!("Cannot store data (will be ignored): {}", error);
        if let (OnFlushError::Retain, Some(pages)) = (self.policy.on_error, pages) {
            if !pages.is_empty() {
                debug!("Returning {} pages to the buffer", pages.len());
                self.buffer.restore(pages);
            }
        }
        Ok(FlushOutcome::Failed)
    }

    // Only mutated inside the flush critical section; poisoning cannot leave
    // it half-written
    fn lock_progress(&self) -> MutexGuard<'_, CrawlProgress> {
        self.progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
