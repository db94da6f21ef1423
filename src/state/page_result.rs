//! Page result definitions
//!
//! A `PageResult` is created by the worker right before dispatch, filled in by
//! that worker only, and handed to the result buffer once the fetch attempt
//! ends. Failed fetches still produce a result.

use crate::crawler::{FetchError, PageContent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome of crawling a single URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// The URL as given in the input
    pub url: String,

    /// Final URL after any redirect
    pub loaded_url: Option<String>,

    /// User agent the page was requested with
    pub user_agent: Option<String>,

    /// Proxy authority with credentials stripped
    #[serde(alias = "redactedProxyIdentity")]
    pub redacted_proxy_url: Option<String>,

    pub request_started_at: DateTime<Utc>,

    pub request_finished_at: Option<DateTime<Utc>>,

    /// Response body, raw mode only
    pub raw_content: Option<String>,

    pub status_code: Option<u16>,

    /// Value returned by the synchronous extraction script
    pub extraction_result: Option<serde_json::Value>,

    /// Value returned by the asynchronous extraction script
    pub async_extraction_result: Option<serde_json::Value>,

    pub failure: Option<FetchFailure>,
}

impl PageResult {
    /// Starts a result for `url`, stamping the start time
    pub fn started(
        url: impl Into<String>,
        user_agent: Option<String>,
        redacted_proxy_url: Option<String>,
    ) -> Self {
        Self {
            url: url.into(),
            loaded_url: None,
            user_agent,
            redacted_proxy_url,
            request_started_at: Utc::now(),
            request_finished_at: None,
            raw_content: None,
            status_code: None,
            extraction_result: None,
            async_extraction_result: None,
            failure: None,
        }
    }

    /// Fills in the content of a successful fetch
    pub fn complete(&mut self, content: PageContent) {
        self.request_finished_at = Some(Utc::now());
        self.loaded_url = content.loaded_url;
        self.status_code = content.status_code;
        self.raw_content = content.raw_content;
        self.extraction_result = content.extraction_result;
        self.async_extraction_result = content.async_extraction_result;
    }

    /// Records a failed fetch
    pub fn fail(&mut self, error: &FetchError) {
        self.request_finished_at = Some(Utc::now());
        self.failure = Some(FetchFailure {
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Serializable description of why a page could not be crawled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Broad classification of page-level failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Connection, DNS, TLS or body read failure
    Network,

    /// The fetch did not finish within the per-page timeout
    Timeout,

    /// The proxy URL could not be used
    Proxy,

    /// Browser session could not be opened or driven
    Browser,

    /// An extraction script threw or could not be evaluated
    Script,

    /// The fetcher panicked
    Panic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Proxy => "proxy",
            Self::Browser => "browser",
            Self::Script => "script",
            Self::Panic => "panic",
        };
        write!(f, "{}", name)
    }
}
