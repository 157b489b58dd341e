//! Browser lifecycle handle
//!
//! Owns the chromiumoxide browser, its CDP event handler task, and the
//! temporary profile directory.

use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::info;

use super::{BrowserError, BrowserResult};
use crate::browser_setup::LaunchOptions;

/// Wrapper for Browser and its event handler task
///
/// The handler MUST be aborted when the browser goes away, otherwise it keeps
/// polling a dead websocket. `Drop` aborts it and chromiumoxide's own drop
/// kills the child process, so a panic or early return never leaves Chrome
/// running.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    pub(crate) fn browser_mut(&mut self) -> &mut Browser {
        &mut self.browser
    }

    /// Remove the temporary profile directory
    ///
    /// MUST be called AFTER `browser.wait()` completes so Chrome has released
    /// its file handles. Blocking, because it also runs from `Drop`.
    pub fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            info!("Cleaning up temp directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                tracing::warn!(
                    "Failed to clean up temp directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        info!("Dropping BrowserWrapper - aborting handler task");
        self.handler.abort();

        if let Some(path) = &self.user_data_dir {
            tracing::warn!(
                "BrowserWrapper dropped without explicit shutdown. \
                 Temp directory will be orphaned: {}",
                path.display()
            );
        }
    }
}

/// Launch the session browser with a per-process profile directory
///
/// Returns the browser, its handler task, and the profile path that MUST be
/// cleaned up after the browser shuts down.
pub async fn launch_browser(options: &LaunchOptions) -> BrowserResult<(Browser, JoinHandle<()>, PathBuf)> {
    info!("Launching session browser");

    let user_data_dir =
        std::env::temp_dir().join(format!("etsy_scraper_profile_{}", std::process::id()));

    let (browser, handler) =
        crate::browser_setup::launch_browser(options, Some(user_data_dir.clone()))
            .await
            .map_err(|e| BrowserError::SessionStart(format!("{e:#}")))?;

    Ok((browser, handler, user_data_dir))
}

/// Create a blank page so the stealth script is registered before the first navigation
pub async fn create_blank_page(wrapper: &BrowserWrapper) -> BrowserResult<Page> {
    let page = wrapper
        .browser()
        .new_page("about:blank")
        .await
        .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;

    info!("Created blank session page");
    Ok(page)
}
