//! Checkpoint record and batch key derivation
//!
//! The checkpoint is stored under a single key and names how many pages and
//! batches have been durably committed. Batch keys are derived from the batch
//! ordinal so that lexicographic and numeric order coincide.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Key under which the checkpoint record is stored
pub const PROGRESS_KEY: &str = "STATE";

/// Constant tag in front of every batch key
pub const BATCH_KEY_PREFIX: &str = "PAGES-";

/// Number of digits in the zero-padded batch ordinal
pub const BATCH_KEY_WIDTH: usize = 9;

/// The resumable checkpoint
///
/// `pages_completed_count` only advances after the batch holding those pages
/// has been written, so on restart the first `pages_completed_count` URLs of
/// the input can be skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlProgress {
    /// Number of URLs whose results are durably committed
    #[serde(alias = "pageCount")]
    pub pages_completed_count: u64,

    /// Number of batches written, used to derive the next batch key
    #[serde(alias = "storeCount")]
    pub batches_written_count: u64,

    /// SHA-256 of the ordered URL list the checkpoint was written against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_fingerprint: Option<String>,
}

impl CrawlProgress {
    /// Creates an empty checkpoint bound to the given input fingerprint
    pub fn new(input_fingerprint: Option<String>) -> Self {
        Self {
            pages_completed_count: 0,
            batches_written_count: 0,
            input_fingerprint,
        }
    }

    /// Key of the batch the next flush will write
    pub fn next_batch_key(&self) -> String {
        batch_key(self.batches_written_count + 1)
    }

    /// Records a committed batch of `pages` results
    pub fn record_batch(&mut self, pages: usize) {
        self.pages_completed_count += pages as u64;
        self.batches_written_count += 1;
    }

    /// Number of leading input URLs to treat as already completed
    ///
    /// Never exceeds `total_urls`.
    pub fn resume_offset(&self, total_urls: usize) -> usize {
        usize::try_from(self.pages_completed_count)
            .unwrap_or(usize::MAX)
            .min(total_urls)
    }

    /// Returns true if this checkpoint was written against a different URL list
    ///
    /// Checkpoints without a recorded fingerprint never mismatch.
    pub fn fingerprint_mismatch(&self, fingerprint: &str) -> bool {
        self.input_fingerprint
            .as_deref()
            .is_some_and(|recorded| recorded != fingerprint)
    }
}

/// Formats the key of batch number `ordinal` (1-based)
///
/// # Examples
///
/// ```
/// use resume_crawl::state::batch_key;
///
/// assert_eq!(batch_key(7), "PAGES-000000007");
/// ```
pub fn batch_key(ordinal: u64) -> String {
    format!(
        "{}{:0width$}",
        BATCH_KEY_PREFIX,
        ordinal,
        width = BATCH_KEY_WIDTH
    )
}

/// Extracts the ordinal from a batch key, if it is one
pub fn parse_batch_key(key: &str) -> Option<u64> {
    let digits = key.strip_prefix(BATCH_KEY_PREFIX)?;
    if digits.len() < BATCH_KEY_WIDTH || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Computes the fingerprint of an ordered URL list
pub fn input_fingerprint<S: AsRef<str>>(urls: &[S]) -> String {
    let mut hasher = Sha256::new();
    for url in urls {
        hasher.update(url.as_ref().as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
