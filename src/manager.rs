//! Browser session ownership
//!
//! One [`BrowserManager`] owns the only browser of a run and its single page.
//! It is passed explicitly to the pipeline as a [`PageFetcher`]; nothing else
//! touches the browser.
//!
//! # Shutdown
//!
//! [`BrowserManager::shutdown`] must be awaited on every exit path. It calls
//! BOTH `browser.close()` and `browser.wait()`: dropping the wrapper only
//! aborts the handler task and leaves the close to chromiumoxide's drop, which
//! cannot wait for the process or remove the profile directory.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::browser::{BrowserError, BrowserResult, BrowserWrapper, create_blank_page, launch_browser};
use crate::browser_setup::LaunchOptions;
use crate::fetcher::{FetchError, PageFetcher, validate_url};
use crate::utils::constants::WEBDRIVER_MASK_SCRIPT;
use crate::utils::wait_for_element;

/// Bounds for one fetch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchTimeouts {
    /// Upper bound for `goto` plus the load lifecycle
    pub navigation: Duration,
    /// Upper bound for the readiness selector to appear after load
    pub ready: Duration,
}

pub struct BrowserManager {
    browser: Option<BrowserWrapper>,
    page: Option<Page>,
    timeouts: FetchTimeouts,
}

impl BrowserManager {
    /// Launch the browser and prepare the session page
    ///
    /// # Errors
    /// [`BrowserError::SessionStart`] if Chrome cannot be found, downloaded, or
    /// launched. A browser that started but could not open its page is shut
    /// down again before the error is returned.
    pub async fn open(options: &LaunchOptions, timeouts: FetchTimeouts) -> BrowserResult<Self> {
        let (browser, handler, user_data_dir) = launch_browser(options).await?;
        let mut manager = Self {
            browser: Some(BrowserWrapper::new(browser, handler, user_data_dir)),
            page: None,
            timeouts,
        };

        match manager.prepare_page().await {
            Ok(page) => {
                manager.page = Some(page);
                info!("Browser session ready (headless: {})", options.headless);
                Ok(manager)
            }
            Err(e) => {
                manager.shutdown().await;
                Err(BrowserError::SessionStart(e.to_string()))
            }
        }
    }

    async fn prepare_page(&self) -> BrowserResult<Page> {
        let wrapper = self.browser.as_ref().ok_or(BrowserError::Closed)?;
        let page = create_blank_page(wrapper).await?;
        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
            WEBDRIVER_MASK_SCRIPT,
        ))
        .await
        .map_err(|e| BrowserError::PageCreationFailed(format!("stealth script: {e}")))?;
        Ok(page)
    }

    /// Close the browser, wait for the process, remove the profile
    ///
    /// Safe to call more than once; later calls are no-ops.
    pub async fn shutdown(&mut self) {
        if let Some(page) = self.page.take()
            && let Err(e) = page.close().await
        {
            debug!("Failed to close session page: {}", e);
        }

        if let Some(mut wrapper) = self.browser.take() {
            info!("Shutting down browser");

            if let Err(e) = wrapper.browser_mut().close().await {
                warn!("Failed to close browser cleanly: {}", e);
            }

            if let Err(e) = wrapper.browser_mut().wait().await {
                warn!("Failed to wait for browser exit: {}", e);
            }

            wrapper.cleanup_temp_dir();
            drop(wrapper);
            info!("Browser shutdown complete");
        }
    }
}

#[async_trait]
impl PageFetcher for BrowserManager {
    async fn fetch(&mut self, url: &str, ready_selector: &str) -> Result<String, FetchError> {
        validate_url(url)?;
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| FetchError::navigation(url, BrowserError::Closed))?;
        let navigation_timeout = self.timeouts.navigation;

        debug!("Navigating to {}", url);
        let navigation = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(navigation_timeout, navigation).await {
            Err(_) => {
                return Err(FetchError::NavigationTimeout {
                    url: url.to_string(),
                    selector: "page load".to_string(),
                    timeout_ms: navigation_timeout.as_millis() as u64,
                });
            }
            Ok(Err(e)) => return Err(FetchError::navigation(url, e)),
            Ok(Ok(())) => {}
        }

        if let Ok(Some(final_url)) = page.url().await
            && final_url != url
        {
            debug!("{} redirected to {}", url, final_url);
        }

        wait_for_element(page, url, ready_selector, self.timeouts.ready).await?;

        page.content()
            .await
            .map_err(|e| FetchError::navigation(url, format!("failed to read page content: {e}")))
    }
}
