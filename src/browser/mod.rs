//! Browser infrastructure for launching and managing the Chrome session

mod wrapper;

pub use wrapper::{BrowserWrapper, create_blank_page, launch_browser};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    /// The browser could not be started; fatal for the run
    #[error("Failed to start browser session: {0}")]
    SessionStart(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("Browser session is closed")]
    Closed,
}

pub type BrowserResult<T> = Result<T, BrowserError>;
