//! Page fetcher interface and the raw HTTP implementation
//!
//! The scheduler only sees the `PageFetcher` trait. Two implementations exist:
//! - `HttpFetcher`: one plain GET, returns body and status code
//! - `WebDriverFetcher` (see `browser`): renders the page in a browser session
//!   and runs the extraction scripts
//!
//! Every error is returned as a `FetchError` value. The scheduler records it on
//! the page result; it never aborts the run.

use crate::config::HttpConfig;
use crate::state::FailureKind;
use crate::url::redact_proxy_url;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::{Client, ClientBuilder, Proxy};
use std::time::Duration;
use thiserror::Error;

/// How a page is retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Single HTTP request, body stored as-is
    Raw,
    /// Browser session with optional extraction scripts
    Rendered,
}

/// Per-page fetch options
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub proxy_url: Option<String>,
    pub user_agent: Option<String>,
    /// Time a rendered page is given to settle before it is read
    pub settle_delay: Duration,
    pub script: Option<String>,
    pub async_script: Option<String>,
}

/// What a successful fetch produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    pub loaded_url: Option<String>,
    pub status_code: Option<u16>,
    pub raw_content: Option<String>,
    pub extraction_result: Option<serde_json::Value>,
    pub async_extraction_result: Option<serde_json::Value>,
}

/// Page-level fetch failure
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request for {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Fetching {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("Proxy {proxy} cannot be used: {message}")]
    Proxy { proxy: String, message: String },

    #[error("Browser session error: {0}")]
    Browser(String),

    #[error("Extraction script failed: {0}")]
    Script(String),

    #[error("Fetcher panicked: {0}")]
    Panicked(String),
}

impl FetchError {
    /// Classification stored on the page result
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Http { source, .. } if source.is_timeout() => FailureKind::Timeout,
            Self::Http { .. } => FailureKind::Network,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Proxy { .. } => FailureKind::Proxy,
            Self::Browser(_) => FailureKind::Browser,
            Self::Script(_) => FailureKind::Script,
            Self::Panicked(_) => FailureKind::Panic,
        }
    }

    pub(crate) fn invalid_proxy(proxy_url: &str, message: impl ToString) -> Self {
        Self::Proxy {
            proxy: redact_proxy_url(proxy_url),
            message: message.to_string(),
        }
    }
}

/// Retrieves one page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<PageContent, FetchError>;
}

/// Builds the shared HTTP client
///
/// # Example
///
/// ```no_run
/// use resume_crawl::config::HttpConfig;
/// use resume_crawl::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    client_builder(config).build()
}

fn client_builder(config: &HttpConfig) -> ClientBuilder {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
}

/// Raw-mode fetcher
pub struct HttpFetcher {
    client: Client,
    config: HttpConfig,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            config: config.clone(),
        })
    }

    /// Shared client, or a dedicated one routed through `proxy_url`
    fn client_for(&self, proxy_url: Option<&str>) -> Result<Client, FetchError> {
        let Some(proxy_url) = proxy_url else {
            return Ok(self.client.clone());
        };

        let proxy = Proxy::all(proxy_url).map_err(|e| FetchError::invalid_proxy(proxy_url, e))?;
        client_builder(&self.config)
            .proxy(proxy)
            .build()
            .map_err(|e| FetchError::invalid_proxy(proxy_url, e))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<PageContent, FetchError> {
        let client = self.client_for(options.proxy_url.as_deref())?;

        let mut request = client.get(url);
        if let Some(user_agent) = &options.user_agent {
            request = request.header(USER_AGENT, user_agent);
        }

        let http_error = |source: reqwest::Error| FetchError::Http {
            url: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(http_error)?;
        let status_code = response.status().as_u16();
        let loaded_url = response.url().to_string();
        let body = response.text().await.map_err(http_error)?;

        Ok(PageContent {
            loaded_url: Some(loaded_url),
            status_code: Some(status_code),
            raw_content: Some(body),
            extraction_result: None,
            async_extraction_result: None,
        })
    }
}
