//! URL list loading
//!
//! A URL list file is plain text with one URL per line. Lines are trimmed and
//! anything that does not parse as an absolute URL with a host is skipped.

use crate::url::parse_with_host;
use crate::CrawlError;
use reqwest::Client;

/// Extracts the valid URLs from a newline-separated text, in order
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| parse_with_host(line).is_ok())
        .map(str::to_string)
        .collect()
}

/// Downloads a URL list file and returns the valid URLs it contains
pub async fn fetch_url_list(client: &Client, list_url: &str) -> Result<Vec<String>, CrawlError> {
    tracing::info!("Fetching URL list from {}", list_url);

    let list_error = |source: reqwest::Error| CrawlError::UrlList {
        url: list_url.to_string(),
        source,
    };

    let text = client
        .get(list_url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(list_error)?
        .text()
        .await
        .map_err(list_error)?;

    tracing::info!("Processing URLs from text file (length: {})", text.len());
    let urls = parse_url_list(&text);
    tracing::info!("Added {} URLs from the text file", urls.len());

    Ok(urls)
}
