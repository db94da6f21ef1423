//! In-memory buffer of completed page results
//!
//! Workers append concurrently. Only the flush coordinator drains the buffer,
//! and it does so by swapping out the whole vector, so every page lands in
//! exactly one snapshot.

use crate::state::PageResult;
use std::sync::{Mutex, MutexGuard};

/// Completed page results awaiting a durable flush
#[derive(Debug, Default)]
pub struct ResultBuffer {
    pages: Mutex<Vec<PageResult>>,
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a finished page
    pub fn append(&self, page: PageResult) {
        self.lock().push(page);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Takes every buffered page, leaving the buffer empty
    ///
    /// Pages appended after this call belong to the next snapshot.
    pub(crate) fn snapshot_and_clear(&self) -> Vec<PageResult> {
        std::mem::take(&mut *self.lock())
    }

    /// Puts a snapshot back in front of anything appended since it was taken
    pub(crate) fn restore(&self, mut snapshot: Vec<PageResult>) {
        let mut pages = self.lock();
        snapshot.append(&mut pages);
        *pages = snapshot;
    }

    // A panic while holding the lock cannot leave the Vec half-updated
    fn lock(&self) -> MutexGuard<'_, Vec<PageResult>> {
        self.pages.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
