//! Page retrieval seam between the pipeline and the browser
//!
//! The pipeline only sees [`PageFetcher`], so tests drive it with canned
//! markup instead of a live browser.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Timed out after {timeout_ms}ms waiting for '{selector}' on {url}")]
    NavigationTimeout {
        url: String,
        selector: String,
        timeout_ms: u64,
    },

    #[error("Navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("URL must start with http:// or https://: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    pub fn navigation(url: &str, reason: impl std::fmt::Display) -> Self {
        FetchError::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Loads a URL and returns its rendered markup
///
/// Implementations attempt each URL once; retry policy belongs to the caller.
#[async_trait]
pub trait PageFetcher: Send {
    /// Navigate to `url`, wait until `ready_selector` matches, return the page HTML
    async fn fetch(&mut self, url: &str, ready_selector: &str) -> Result<String, FetchError>;
}

pub(crate) fn validate_url(url: &str) -> Result<(), FetchError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(FetchError::InvalidUrl(url.to_string()))
    }
}
