//! Element polling for script-rendered pages
//!
//! Search results are rendered after the load event fires, so the fetcher
//! polls for the readiness selector instead of trusting navigation alone.

use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::element::Element;

use crate::fetcher::FetchError;

/// Wait for an element to appear in the DOM using exponential backoff polling
///
/// Polls every 100ms at first, doubling up to a 1s interval, until `timeout`.
///
/// # Errors
/// [`FetchError::NavigationTimeout`] when the selector never matches.
pub async fn wait_for_element(
    page: &Page,
    url: &str,
    selector: &str,
    timeout: Duration,
) -> Result<Element, FetchError> {
    let start = std::time::Instant::now();
    let mut poll_interval = Duration::from_millis(100);
    let max_interval = Duration::from_secs(1);

    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Ok(element);
        }

        if start.elapsed() >= timeout {
            return Err(FetchError::NavigationTimeout {
                url: url.to_string(),
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }

        tokio::time::sleep(poll_interval).await;
        poll_interval = (poll_interval * 2).min(max_interval);
    }
}
