//! Rendered-mode fetcher backed by a WebDriver server
//!
//! Each page gets its own browser session, opened with the page's proxy and
//! user agent. The session is quit on every exit path: explicitly once the
//! page has been read, and from `Drop` if the fetch future is cancelled (for
//! example by the per-page timeout).

use crate::config::BrowserConfig;
use crate::crawler::fetcher::{FetchError, FetchOptions, PageContent, PageFetcher};
use crate::url::proxy_server_address;
use async_trait::async_trait;
use std::time::Duration;
use thirtyfour::prelude::*;
use tracing::{debug, warn};

/// Fetcher that renders pages in a browser through WebDriver
pub struct WebDriverFetcher {
    config: BrowserConfig,
}

impl WebDriverFetcher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// Opens a session configured for one page
    async fn open_session(&self, options: &FetchOptions) -> Result<BrowserSession, FetchError> {
        let mut caps = DesiredCapabilities::chrome();

        if self.config.headless {
            caps.set_headless().map_err(browser_error)?;
        }

        if let Some(user_agent) = &options.user_agent {
            caps.add_chrome_arg(&format!("--user-agent={}", user_agent))
                .map_err(browser_error)?;
        }

        // Chrome ignores credentials in --proxy-server
        if let Some(proxy_url) = &options.proxy_url {
            let address = proxy_server_address(proxy_url)
                .ok_or_else(|| FetchError::invalid_proxy(proxy_url, "no proxy host"))?;
            caps.add_chrome_arg(&format!("--proxy-server={}", address))
                .map_err(browser_error)?;
        }

        caps.add_chrome_arg("--disable-dev-shm-usage")
            .map_err(browser_error)?;

        let driver = WebDriver::new(&self.config.webdriver_url, caps)
            .await
            .map_err(browser_error)?;
        let session = BrowserSession {
            driver: Some(driver),
        };

        session
            .driver()?
            .set_page_load_timeout(Duration::from_secs(self.config.page_load_timeout_secs))
            .await
            .map_err(browser_error)?;

        debug!("Browser session opened");
        Ok(session)
    }

    /// Loads the page and runs the extraction scripts
    async fn load(
        &self,
        driver: &WebDriver,
        url: &str,
        options: &FetchOptions,
    ) -> Result<PageContent, FetchError> {
        driver.goto(url).await.map_err(browser_error)?;

        if !options.settle_delay.is_zero() {
            tokio::time::sleep(options.settle_delay).await;
        }

        let loaded_url = driver.current_url().await.map_err(browser_error)?.to_string();

        let extraction_result = match &options.script {
            Some(script) => Some(
                driver
                    .execute(script, Vec::new())
                    .await
                    .map_err(script_error)?
                    .json()
                    .clone(),
            ),
            None => None,
        };

        let async_extraction_result = match &options.async_script {
            Some(script) => Some(
                driver
                    .execute_async(script, Vec::new())
                    .await
                    .map_err(script_error)?
                    .json()
                    .clone(),
            ),
            None => None,
        };

        Ok(PageContent {
            loaded_url: Some(loaded_url),
            status_code: None,
            raw_content: None,
            extraction_result,
            async_extraction_result,
        })
    }
}

#[async_trait]
impl PageFetcher for WebDriverFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<PageContent, FetchError> {
        let session = self.open_session(options).await?;
        let result = match session.driver() {
            Ok(driver) => self.load(driver, url, options).await,
            Err(e) => Err(e),
        };
        session.release().await;
        result
    }
}

/// A browser session scoped to one page
struct BrowserSession {
    driver: Option<WebDriver>,
}

impl BrowserSession {
    fn driver(&self) -> Result<&WebDriver, FetchError> {
        self.driver
            .as_ref()
            .ok_or_else(|| FetchError::Browser("browser session already released".to_string()))
    }

    /// Quits the session, waiting for the WebDriver server to confirm
    async fn release(mut self) {
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.quit().await {
                warn!("Error closing browser session: {}", e);
            }
            debug!("Browser session closed");
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = driver.quit().await {
                    warn!("Error closing browser session during drop: {}", e);
                }
            });
        }
    }
}

fn browser_error(e: WebDriverError) -> FetchError {
    FetchError::Browser(e.to_string())
}

fn script_error(e: WebDriverError) -> FetchError {
    FetchError::Script(e.to_string())
}
