use thiserror::Error;

use crate::browser::BrowserError;
use crate::export::ExportError;

/// Configuration file and value errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse config {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
}

/// Errors that end a run with a non-zero exit code
///
/// Fetch and parse errors never get here; they are recorded per item in the
/// run summary and the run continues.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
