use crate::storage::DEFAULT_MAX_RECORD_BYTES;
use serde::Deserialize;

/// Main configuration structure for Resume-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub input: InputConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// What to crawl and how each page is requested
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InputConfig {
    /// Target URLs, crawled in this order
    #[serde(default)]
    pub urls: Vec<String>,

    /// Remote newline-separated text file with more URLs
    pub url_list_file: Option<String>,

    /// Synchronous extraction script run against rendered pages
    pub script: Option<String>,

    /// Asynchronous extraction script run against rendered pages
    pub async_script: Option<String>,

    /// Proxy pool; one is picked at random per page
    #[serde(default)]
    pub proxy_urls: Vec<String>,

    /// User agent pool; one is picked at random per page
    #[serde(default)]
    pub user_agents: Vec<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of in-flight page fetches
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Seconds to let a rendered page settle before reading it
    #[serde(default)]
    pub settle_secs: f64,

    /// Fetch raw HTML over HTTP instead of rendering in a browser
    #[serde(default)]
    pub raw_html_only: bool,

    /// Buffered page count that triggers a non-forced flush
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: u32,

    /// Per-page timeout in seconds, 0 disables it
    #[serde(default)]
    pub page_timeout_secs: u64,

    /// What happens to a batch whose non-forced write failed
    #[serde(default)]
    pub on_flush_error: OnFlushError,

    /// Refuse to resume when the URL list differs from the checkpoint's
    #[serde(default)]
    pub strict_resume: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            settle_secs: 0.0,
            raw_html_only: false,
            flush_threshold: default_flush_threshold(),
            page_timeout_secs: 0,
            on_flush_error: OnFlushError::default(),
            strict_resume: false,
        }
    }
}

/// Policy for a failed non-forced flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnFlushError {
    /// Log the failure and discard the batch
    #[default]
    Drop,
    /// Log the failure and put the batch back in front of the buffer
    Retain,
}

/// Checkpoint store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Largest record the store accepts
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            max_record_bytes: default_max_record_bytes(),
        }
    }
}

/// Raw HTTP fetch configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Rendered fetch configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BrowserConfig {
    /// WebDriver endpoint sessions are opened against
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default = "default_headless")]
    pub headless: bool,

    #[serde(default = "default_page_load_timeout_secs")]
    pub page_load_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            page_load_timeout_secs: default_page_load_timeout_secs(),
        }
    }
}

fn default_concurrency() -> u32 {
    1
}

fn default_flush_threshold() -> u32 {
    10
}

fn default_database_path() -> String {
    "./crawl-state.db".to_string()
}

fn default_max_record_bytes() -> usize {
    DEFAULT_MAX_RECORD_BYTES
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_page_load_timeout_secs() -> u64 {
    60
}
