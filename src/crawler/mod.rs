//! Crawler module for page fetching and checkpointed result persistence
//!
//! This module contains the core crawling logic, including:
//! - The `PageFetcher` seam with raw HTTP and WebDriver implementations
//! - Proxy and user agent selection per page
//! - The bounded worker pool that walks the URL list
//! - Buffering and serialized, checkpointed flushing of results
//! - Overall run coordination and resume

mod browser;
mod buffer;
mod coordinator;
mod fetcher;
mod flush;
mod identity;
mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use browser::WebDriverFetcher;
pub use buffer::ResultBuffer;
pub use coordinator::{run_crawl, Coordinator};
pub use fetcher::{
    build_http_client, FetchError, FetchMode, FetchOptions, HttpFetcher, PageContent, PageFetcher,
};
pub use flush::{FlushCoordinator, FlushOutcome, FlushPolicy, SkipReason};
pub use identity::{select_and_materialize, SelectedIdentity, SESSION_PLACEHOLDER};
pub use scheduler::{CrawlInput, CrawlScheduler, RunOutcome};

use crate::config::Config;
use crate::CrawlError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the checkpoint store
/// 2. Resolve the URL list
/// 3. Load the checkpoint and compute the resume offset
/// 4. Fetch the remaining pages with bounded concurrency
/// 5. Flush the last buffered results
pub async fn crawl(config: Config, fresh: bool) -> Result<RunOutcome, CrawlError> {
    run_crawl(config, fresh).await
}
