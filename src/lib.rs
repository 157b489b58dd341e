//! Etsy listing scraper with heuristic SEO scoring
//!
//! Drives one chromiumoxide browser session through search result pages,
//! optionally visits each product page, scores it, and exports JSON and CSV.

mod browser;
pub mod browser_setup;
pub mod detail;
pub mod export;
pub mod fetcher;
pub mod listing;
mod manager;
pub mod proxy;
pub mod records;
pub mod scrape;
pub mod seo;
pub mod site;
mod utils;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::seo::SeoConfig;

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub crawl: CrawlConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub seo: SeoConfig,
}

/// Browser launch and page-wait configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Fixed user agent; a random desktop agent is chosen when unset
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Bound for page navigation and load, also used as the CDP request timeout
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Bound for the content-ready selector after load
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

/// Pacing between requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Wait before every search page after the first
    #[serde(default = "default_page_delay")]
    pub page_delay: DelayRange,

    /// Wait before every product page after the first
    #[serde(default = "default_detail_delay")]
    pub detail_delay: DelayRange,
}

/// Uniformly random delay in `min_ms..=max_ms`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange { min_ms: 0, max_ms: 0 };

    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::rng().random_range(self.min_ms..=self.max_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log file written next to stderr output; `None` disables it
    #[serde(default = "default_log_file")]
    pub log_file: Option<PathBuf>,
}

fn default_headless() -> bool {
    true
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_ready_timeout_ms() -> u64 {
    10_000
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_page_delay() -> DelayRange {
    DelayRange {
        min_ms: 2_000,
        max_ms: 5_000,
    }
}

fn default_detail_delay() -> DelayRange {
    DelayRange {
        min_ms: 1_000,
        max_ms: 3_000,
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("etsy_scraper.log"))
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            user_agent: None,
            navigation_timeout_ms: default_navigation_timeout_ms(),
            ready_timeout_ms: default_ready_timeout_ms(),
            window: WindowConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            page_delay: default_page_delay(),
            detail_delay: default_detail_delay(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// Check values serde cannot express constraints for
    ///
    /// # Errors
    /// [`ConfigError::InvalidValue`] for out-of-range timeouts, inverted delay
    /// ranges, SEO points above the maximum score, or an empty output directory.
    pub fn validate(&self) -> Result<(), ConfigError> {
        utils::validate_navigation_timeout("browser.navigation_timeout_ms", self.browser.navigation_timeout_ms)?;
        utils::validate_navigation_timeout("browser.ready_timeout_ms", self.browser.ready_timeout_ms)?;

        for (name, range) in [
            ("crawl.page_delay", &self.crawl.page_delay),
            ("crawl.detail_delay", &self.crawl.detail_delay),
        ] {
            if range.min_ms > range.max_ms {
                return Err(ConfigError::InvalidValue(format!(
                    "{name}: min_ms ({}) is greater than max_ms ({})",
                    range.min_ms, range.max_ms
                )));
            }
        }

        self.seo.validate()?;

        if self.output.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue("output.data_dir must not be empty".into()));
        }
        Ok(())
    }

    pub fn fetch_timeouts(&self) -> FetchTimeouts {
        FetchTimeouts {
            navigation: Duration::from_millis(self.browser.navigation_timeout_ms),
            ready: Duration::from_millis(self.browser.ready_timeout_ms),
        }
    }
}

/// Parse a YAML config file
///
/// # Errors
/// [`ConfigError::Read`] or [`ConfigError::Parse`].
pub fn load_yaml_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Load the explicit config, else `config.yaml` if present, else defaults, and validate
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let config = match explicit {
        Some(path) => load_yaml_config(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            load_yaml_config(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}

pub use browser::{BrowserError, BrowserResult, BrowserWrapper};
pub use browser_setup::LaunchOptions;
pub use detail::{DetailParseError, extract_detail};
pub use export::{ExportError, ExportPaths, export};
pub use fetcher::{FetchError, PageFetcher};
pub use listing::{extract_listings, extract_listings_page};
pub use manager::{BrowserManager, FetchTimeouts};
pub use seo::{SeoAnalysis, SeoScorer};
pub use utils::{ConfigError, ScrapeError};
