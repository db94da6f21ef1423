//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlProgress`: the resumable checkpoint record (pages committed, batches written)
//! - `PageResult`: the record produced for every dispatched URL, success or failure

mod page_result;
mod progress;

// Re-export main types
pub use page_result::{FailureKind, FetchFailure, PageResult};
pub use progress::{
    batch_key, input_fingerprint, parse_batch_key, CrawlProgress, BATCH_KEY_PREFIX,
    BATCH_KEY_WIDTH, PROGRESS_KEY,
};
