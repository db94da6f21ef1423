//! URL handling module for Resume-Crawl
//!
//! This module provides URL-list loading (inline and remote text files) and
//! proxy URL redaction for stored results.

mod list;
mod proxy;

pub use list::{fetch_url_list, parse_url_list};
pub use proxy::{proxy_server_address, redact_proxy_url};

use crate::{UrlError, UrlResult};
use url::Url;

/// Parses `value` as an absolute URL that names a host
///
/// # Examples
///
/// ```
/// use resume_crawl::url::parse_with_host;
///
/// assert!(parse_with_host("https://example.com/page").is_ok());
/// assert!(parse_with_host("example.com/page").is_err());
/// ```
pub fn parse_with_host(value: &str) -> UrlResult<Url> {
    let url = Url::parse(value).map_err(|e| UrlError::Parse(format!("{}: {}", value, e)))?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingHost(value.to_string())),
    }
}
