//! Resume-Crawl: a resumable, bounded-concurrency page crawler
//!
//! This crate fetches a fixed list of URLs (raw HTTP or a WebDriver-rendered
//! browser session), buffers the page results and commits them to a durable
//! key/blob store in numbered batches. A checkpoint record is advanced only
//! after its batch is stored, so a killed run restarts where it left off.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Resume-Crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Failed to fetch URL list from {url}: {source}")]
    UrlList { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error(
        "Input URL list changed since the checkpoint was written (checkpoint {expected}, input {found})"
    )]
    InputChanged { expected: String, found: String },

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CrawlError {
    /// Returns true for store failures that no retry can fix without a
    /// policy change (e.g. a batch larger than the store accepts)
    pub fn is_non_recoverable(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_non_recoverable())
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Result type alias for Resume-Crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlInput, CrawlScheduler, FlushCoordinator, ResultBuffer, RunOutcome};
pub use state::{CrawlProgress, PageResult};
pub use storage::{CheckpointStore, SqliteStore};
