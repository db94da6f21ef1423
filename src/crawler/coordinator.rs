//! Crawler coordinator - wires a run together
//!
//! This module turns a validated config into a running crawl:
//! - Opens (and on `--fresh`, clears) the checkpoint store
//! - Resolves the URL list, including a remote URL list file
//! - Loads the checkpoint and checks it against the current input
//! - Picks the fetcher for the configured mode
//! - Hands everything to the scheduler

use crate::config::Config;
use crate::crawler::browser::WebDriverFetcher;
use crate::crawler::buffer::ResultBuffer;
use crate::crawler::fetcher::{build_http_client, FetchMode, HttpFetcher, PageFetcher};
use crate::crawler::flush::{FlushCoordinator, FlushPolicy};
use crate::crawler::scheduler::{CrawlInput, CrawlScheduler, RunOutcome};
use crate::state::CrawlProgress;
use crate::storage::{load_progress, open_store, CheckpointStore, SqliteStore};
use crate::url::fetch_url_list;
use crate::CrawlError;
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    store: Arc<dyn CheckpointStore>,
    client: Client,
}

impl Coordinator {
    /// Creates a coordinator backed by the configured SQLite store
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `fresh` - Discard any existing checkpoint and batches first
    pub fn new(config: Config, fresh: bool) -> Result<Self, CrawlError> {
        let store = open_store(
            Path::new(&config.store.database_path),
            config.store.max_record_bytes,
        )?;

        if fresh {
            tracing::info!("Starting fresh, clearing {}", config.store.database_path);
            store.clear()?;
        }

        Self::with_store(config, Arc::new(store))
    }

    /// Creates a coordinator for read-only inspection such as `--dry-run`
    ///
    /// An existing database is opened as is. A missing one is not created; an
    /// empty in-memory store stands in for it.
    pub fn inspect(config: Config) -> Result<Self, CrawlError> {
        let path = Path::new(&config.store.database_path);
        let store = if path.exists() {
            open_store(path, config.store.max_record_bytes)?
        } else {
            tracing::debug!("No database at {}, nothing to resume", config.store.database_path);
            SqliteStore::new_in_memory(config.store.max_record_bytes)?
        };

        Self::with_store(config, Arc::new(store))
    }

    /// Creates a coordinator over an already opened store
    pub fn with_store(config: Config, store: Arc<dyn CheckpointStore>) -> Result<Self, CrawlError> {
        let client = build_http_client(&config.http)?;
        Ok(Self {
            config: Arc::new(config),
            store,
            client,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Inline URLs followed by the contents of the URL list file
    pub async fn resolve_urls(&self) -> Result<Vec<String>, CrawlError> {
        let mut urls = self.config.input.urls.clone();

        if let Some(list_url) = &self.config.input.url_list_file {
            urls.extend(fetch_url_list(&self.client, list_url).await?);
        }

        tracing::info!("{} URLs to crawl", urls.len());
        Ok(urls)
    }

    /// Loads the checkpoint for an input with the given fingerprint
    ///
    /// A checkpoint written against a different URL list is a warning, or an
    /// error with `strict-resume`. The returned checkpoint carries the current
    /// fingerprint either way.
    pub fn resume_progress(&self, fingerprint: &str) -> Result<CrawlProgress, CrawlError> {
        let Some(mut progress) = load_progress(self.store.as_ref())? else {
            tracing::info!("No checkpoint found, starting from the first URL");
            return Ok(CrawlProgress::new(Some(fingerprint.to_string())));
        };

        if progress.fingerprint_mismatch(fingerprint) {
            let expected = progress.input_fingerprint.clone().unwrap_or_default();
            if self.config.crawler.strict_resume {
                return Err(CrawlError::InputChanged {
                    expected,
                    found: fingerprint.to_string(),
                });
            }
            tracing::warn!(
                "Input URL list changed since the checkpoint was written, resuming by position anyway"
            );
        }

        tracing::info!(
            "Resuming from checkpoint: {} pages in {} batches",
            progress.pages_completed_count,
            progress.batches_written_count
        );
        progress.input_fingerprint = Some(fingerprint.to_string());
        Ok(progress)
    }

    /// Resolves the URL list and builds the run input from the config
    pub async fn prepare_input(&self) -> Result<CrawlInput, CrawlError> {
        let urls = self.resolve_urls().await?;
        Ok(CrawlInput::from_config(&self.config, urls)?)
    }

    /// Fetcher for `mode`
    pub fn build_fetcher(&self, mode: FetchMode) -> Result<Arc<dyn PageFetcher>, CrawlError> {
        match mode {
            FetchMode::Raw => Ok(Arc::new(HttpFetcher::new(&self.config.http)?)),
            FetchMode::Rendered => Ok(Arc::new(WebDriverFetcher::new(self.config.browser.clone()))),
        }
    }

    /// Runs the crawl with the fetcher for the input's fetch mode
    pub async fn run(&self) -> Result<RunOutcome, CrawlError> {
        let input = self.prepare_input().await?;
        let fetcher = self.build_fetcher(input.mode)?;
        self.run_input(fetcher, input).await
    }

    /// Runs the crawl with a caller-supplied fetcher
    pub async fn run_with_fetcher(&self, fetcher: Arc<dyn PageFetcher>) -> Result<RunOutcome, CrawlError> {
        let input = self.prepare_input().await?;
        self.run_input(fetcher, input).await
    }

    async fn run_input(
        &self,
        fetcher: Arc<dyn PageFetcher>,
        input: CrawlInput,
    ) -> Result<RunOutcome, CrawlError> {
        let progress = self.resume_progress(&input.fingerprint())?;

        let flusher = Arc::new(FlushCoordinator::new(
            Arc::clone(&self.store),
            Arc::new(ResultBuffer::new()),
            progress,
            FlushPolicy::from_config(&self.config.crawler),
        ));

        let start_time = std::time::Instant::now();
        let outcome = CrawlScheduler::new(fetcher, flusher).run(input).await?;
        tracing::info!("Crawl completed in {:?}", start_time.elapsed());

        Ok(outcome)
    }
}

/// Runs a crawl against the configured store
///
/// # Example
///
/// ```no_run
/// use resume_crawl::config::load_config;
/// use resume_crawl::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("crawl.toml"))?;
/// let outcome = run_crawl(config, false).await?;
/// println!("{} pages committed", outcome.progress.pages_completed_count);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, fresh: bool) -> Result<RunOutcome, CrawlError> {
    let coordinator = Coordinator::new(config, fresh)?;
    coordinator.run().await
}
