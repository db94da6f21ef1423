//! Bounded-concurrency crawl scheduler
//!
//! Dispatches the input URLs in order, never more than `concurrency` at once.
//! Each page is fetched with a freshly picked proxy and user agent, recorded
//! as a success or a failure, appended to the result buffer and followed by an
//! opportunistic flush. A failing page never stops the run; only store errors
//! from the flush coordinator do.

use crate::config::Config;
use crate::crawler::fetcher::{FetchError, FetchMode, FetchOptions, PageContent, PageFetcher};
use crate::crawler::flush::FlushCoordinator;
use crate::crawler::identity::SelectedIdentity;
use crate::state::{input_fingerprint, CrawlProgress, PageResult};
use crate::{ConfigError, CrawlError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Everything a run needs to know about its input
#[derive(Debug, Clone)]
pub struct CrawlInput {
    /// Target URLs in crawl order
    pub urls: Vec<String>,
    pub proxy_urls: Vec<String>,
    pub user_agents: Vec<String>,
    /// Maximum number of pages in flight
    pub concurrency: usize,
    pub settle_delay: Duration,
    /// Selects the fetcher the coordinator builds
    pub mode: FetchMode,
    pub script: Option<String>,
    pub async_script: Option<String>,
    /// Upper bound on one page's fetch, `None` for no limit
    pub page_timeout: Option<Duration>,
}

impl CrawlInput {
    /// Raw-mode input for `urls` with a concurrency of one
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            proxy_urls: Vec::new(),
            user_agents: Vec::new(),
            concurrency: 1,
            settle_delay: Duration::ZERO,
            mode: FetchMode::Raw,
            script: None,
            async_script: None,
            page_timeout: None,
        }
    }

    /// Builds the input from a config and the resolved URL list
    pub fn from_config(config: &Config, urls: Vec<String>) -> Result<Self, ConfigError> {
        let crawler = &config.crawler;
        let settle_delay = Duration::try_from_secs_f64(crawler.settle_secs).map_err(|e| {
            ConfigError::Validation(format!("settle-secs {}: {}", crawler.settle_secs, e))
        })?;

        Ok(Self {
            urls,
            proxy_urls: config.input.proxy_urls.clone(),
            user_agents: config.input.user_agents.clone(),
            concurrency: crawler.concurrency as usize,
            settle_delay,
            mode: if crawler.raw_html_only {
                FetchMode::Raw
            } else {
                FetchMode::Rendered
            },
            script: config.input.script.clone(),
            async_script: config.input.async_script.clone(),
            page_timeout: (crawler.page_timeout_secs > 0)
                .then(|| Duration::from_secs(crawler.page_timeout_secs)),
        })
    }

    /// Fingerprint of the ordered URL list
    pub fn fingerprint(&self) -> String {
        input_fingerprint(&self.urls)
    }

    /// Fetch options for one page fetched as `identity`
    pub fn fetch_options(&self, identity: &SelectedIdentity) -> FetchOptions {
        FetchOptions {
            proxy_url: identity.proxy_url.clone(),
            user_agent: identity.user_agent.clone(),
            settle_delay: self.settle_delay,
            script: self.script.clone(),
            async_script: self.async_script.clone(),
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Pages dispatched during this run
    pub pages_processed: usize,
    /// Pages among them that ended in a failure
    pub failures: usize,
    /// Leading URLs skipped because an earlier run committed them
    pub skipped: usize,
    /// Checkpoint after the final flush
    pub progress: CrawlProgress,
}

/// Drives the worker pool over the input URL list
pub struct CrawlScheduler {
    fetcher: Arc<dyn PageFetcher>,
    flusher: Arc<FlushCoordinator>,
}

impl CrawlScheduler {
    pub fn new(fetcher: Arc<dyn PageFetcher>, flusher: Arc<FlushCoordinator>) -> Self {
        Self { fetcher, flusher }
    }

    /// Crawls every URL not yet covered by the checkpoint
    ///
    /// Returns once all dispatched pages have completed and the final forced
    /// flush has committed them. An error from a flush aborts the remaining
    /// workers.
    pub async fn run(&self, input: CrawlInput) -> Result<RunOutcome, CrawlError> {
        let input = Arc::new(input);
        let total = input.urls.len();

        let checkpoint = self.flusher.progress();
        let skipped = checkpoint.resume_offset(total);
        if checkpoint.pages_completed_count > total as u64 {
            warn!(
                "Checkpoint counts {} completed pages but the input has only {}",
                checkpoint.pages_completed_count, total
            );
        }
        if skipped > 0 {
            info!("Skipping first {} pages that were already crawled", skipped);
        }

        let semaphore = Arc::new(Semaphore::new(input.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut tally = Tally::default();

        for index in skipped..total {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| CrawlError::Worker(e.to_string()))?;

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = tally.record(joined) {
                    tasks.shutdown().await;
                    return Err(e);
                }
            }

            let fetcher = Arc::clone(&self.fetcher);
            let flusher = Arc::clone(&self.flusher);
            let input = Arc::clone(&input);
            tasks.spawn(async move {
                let _permit = permit;
                process_page(fetcher, flusher, input, index).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = tally.record(joined) {
                tasks.shutdown().await;
                return Err(e);
            }
        }

        self.flusher.maybe_flush(true).await?;

        let progress = self.flusher.progress();
        info!(
            "Crawl finished: {} pages processed ({} failed), {} pages committed",
            tally.processed, tally.failures, progress.pages_completed_count
        );

        Ok(RunOutcome {
            pages_processed: tally.processed,
            failures: tally.failures,
            skipped,
            progress,
        })
    }
}

#[derive(Debug, Default)]
struct Tally {
    processed: usize,
    failures: usize,
}

impl Tally {
    /// Counts one finished worker; `Ok(true)` means its page failed
    fn record(&mut self, joined: Result<Result<bool, CrawlError>, JoinError>) -> Result<(), CrawlError> {
        let failed = joined.map_err(|e| CrawlError::Worker(e.to_string()))??;
        self.processed += 1;
        if failed {
            self.failures += 1;
        }
        Ok(())
    }
}

/// Fetches one page, buffers its result and gives the flusher a chance to run
async fn process_page(
    fetcher: Arc<dyn PageFetcher>,
    flusher: Arc<FlushCoordinator>,
    input: Arc<CrawlInput>,
    index: usize,
) -> Result<bool, CrawlError> {
    let url = &input.urls[index];
    let identity = SelectedIdentity::pick(&input.proxy_urls, &input.user_agents, &mut rand::thread_rng());
    let options = input.fetch_options(&identity);

    debug!("Loading page {} ({})", index, url);
    let mut page = PageResult::started(url.clone(), identity.user_agent.clone(), identity.redacted_proxy_url());

    match fetch_isolated(fetcher, url, options, input.page_timeout).await {
        Ok(content) => page.complete(content),
        Err(e) => {
            warn!("Loading of web page failed ({}): {}", url, e);
            page.fail(&e);
        }
    }

    let failed = page.is_failure();
    flusher.buffer().append(page);
    flusher.maybe_flush(false).await?;
    Ok(failed)
}

/// Aborts the wrapped task when dropped
///
/// Cancelling the worker that awaits a fetch must cancel the fetch too, or a
/// browser session outlives the run.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs the fetch in its own task so a panic becomes a page failure, and
/// aborts it once `timeout` elapses
async fn fetch_isolated(
    fetcher: Arc<dyn PageFetcher>,
    url: &str,
    options: FetchOptions,
    timeout: Option<Duration>,
) -> Result<PageContent, FetchError> {
    let owned_url = url.to_string();
    let mut task = AbortOnDrop(tokio::spawn(async move {
        fetcher.fetch(&owned_url, &options).await
    }));

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut task.0).await {
            Ok(joined) => joined,
            // Dropping `task` aborts the fetch and releases its browser session
            Err(_) => {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                    after: limit,
                })
            }
        },
        None => (&mut task.0).await,
    };

    joined.map_err(|e| FetchError::Panicked(panic_message(e)))?
}

fn panic_message(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
