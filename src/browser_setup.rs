use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{error, info, trace, warn};

use crate::BrowserConfig;
use crate::utils::constants::random_user_agent;

/// Everything needed to start one browser session
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    pub headless: bool,
    /// `host:port`, passed to Chrome as an HTTP proxy
    pub proxy: Option<String>,
    /// Fixed user agent; a random desktop agent is used when `None`
    pub user_agent: Option<String>,
    pub window_width: u32,
    pub window_height: u32,
    pub request_timeout: Duration,
}

impl LaunchOptions {
    pub fn from_config(config: &BrowserConfig, proxy: Option<String>) -> Self {
        Self {
            headless: config.headless,
            proxy,
            user_agent: config.user_agent.clone(),
            window_width: config.window.width,
            window_height: config.window.height,
            request_timeout: Duration::from_millis(config.navigation_timeout_ms),
        }
    }

    /// Chrome's `--proxy-server` value
    pub fn proxy_server(&self) -> Option<String> {
        self.proxy.as_deref().map(|proxy| {
            if proxy.contains("://") {
                proxy.to_string()
            } else {
                format!("http://{proxy}")
            }
        })
    }
}

/// Removes the profile directory on drop unless consumed by `into_path()`
struct TempDirGuard {
    path: PathBuf,
    keep: bool,
}

impl TempDirGuard {
    fn new(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path).context("Failed to create user data directory")?;
        Ok(Self { path, keep: false })
    }

    fn into_path(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if !self.keep {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!("Failed to clean up temp dir {}: {}", self.path.display(), e);
            } else {
                info!("Cleaned up temp dir after launch failure: {}", self.path.display());
            }
        }
    }
}

/// Find Chrome/Chromium executable on the system with platform-specific search paths.
pub async fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!("CHROMIUM_PATH points to non-existent file: {}", path.display());
    }

    let paths: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"%LOCALAPPDATA%\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
        ]
    };

    for path_str in paths {
        let path = if let Some(rest) = path_str.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home) => home.join(rest),
                None => continue,
            }
        } else if let Some(rest) = path_str.strip_prefix("%LOCALAPPDATA%") {
            match dirs::data_local_dir() {
                Some(local) => PathBuf::from(format!("{}{}", local.display(), rest)),
                None => continue,
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            info!("Found browser at: {}", path.display());
            return Ok(path);
        }
    }

    if !cfg!(target_os = "windows") {
        for cmd in &["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path_str.is_empty() {
                    let path = PathBuf::from(path_str);
                    info!("Found browser using 'which': {}", path.display());
                    return Ok(path);
                }
            }
        }
    }

    warn!("No Chrome/Chromium executable found. Will download one with the fetcher.");
    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Downloads a managed Chromium into the user cache directory
pub async fn download_managed_browser() -> Result<PathBuf> {
    info!("Downloading managed Chromium browser...");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| std::env::temp_dir().join(".cache"))
        .join("etsy_scraper/chromium");

    std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );

    let revision_info = fetcher.fetch().await.context("Failed to fetch browser")?;
    info!("Downloaded Chromium to: {}", revision_info.folder_path.display());

    Ok(revision_info.executable_path)
}

/// Find or download Chrome and launch it with the session's options
///
/// Automation flags are suppressed and the user agent, proxy, and headless
/// mode come from `options`.
pub async fn launch_browser(
    options: &LaunchOptions,
    chrome_data_dir: Option<PathBuf>,
) -> Result<(Browser, JoinHandle<()>)> {
    let chrome_path = match find_browser_executable().await {
        Ok(path) => path,
        Err(_) => download_managed_browser().await?,
    };

    let user_data_dir_path = chrome_data_dir.unwrap_or_else(|| {
        std::env::temp_dir().join(format!("etsy_scraper_chrome_{}", std::process::id()))
    });
    let temp_guard = TempDirGuard::new(user_data_dir_path)?;

    let user_agent = options
        .user_agent
        .clone()
        .unwrap_or_else(|| random_user_agent().to_string());
    info!("Using user agent: {}", user_agent);

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(options.request_timeout)
        .window_size(options.window_width, options.window_height)
        .user_data_dir(temp_guard.path.clone())
        .chrome_executable(chrome_path);

    if options.headless {
        config_builder = config_builder.headless_mode(HeadlessMode::default());
    } else {
        config_builder = config_builder.with_head();
    }

    config_builder = config_builder
        .arg(format!("--user-agent={user_agent}"))
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-infobars")
        .arg("--disable-notifications")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-breakpad")
        .arg("--disable-features=TranslateUI")
        .arg("--password-store=basic")
        .arg("--use-mock-keychain")
        .arg("--mute-audio");

    if let Some(proxy) = options.proxy_server() {
        info!("Routing browser traffic through proxy {}", proxy);
        config_builder = config_builder.arg(format!("--proxy-server={proxy}"));
    }

    if should_disable_sandbox() {
        info!("Detected containerized environment, disabling sandbox");
        config_builder = config_builder.arg("--no-sandbox").arg("--disable-setuid-sandbox");
    }

    let browser_config = config_builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(h) = handler.next().await {
            if let Err(e) = h {
                let error_msg = e.to_string();

                // Chrome emits CDP events chromiumoxide cannot deserialize;
                // see mattsse/chromiumoxide#167 and #229
                let is_benign_serialization_error = error_msg
                    .contains("data did not match any variant of untagged enum Message")
                    || error_msg.contains("Failed to deserialize WS response");

                if is_benign_serialization_error {
                    trace!("Suppressed benign CDP serialization error: {}", error_msg);
                } else {
                    error!("Browser handler error: {:?}", e);
                }
            }
        }
        info!("Browser handler task completed");
    });

    temp_guard.into_path();
    Ok((browser, handler_task))
}

/// In containers the setuid sandbox does not work
fn should_disable_sandbox() -> bool {
    std::path::Path::new("/.dockerenv").exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_options_follow_config() {
        let mut config = BrowserConfig::default();
        config.headless = false;
        config.user_agent = Some("TestAgent/1.0".to_string());

        let options = LaunchOptions::from_config(&config, Some("10.0.0.1:8080".to_string()));
        assert!(!options.headless);
        assert_eq!(options.user_agent.as_deref(), Some("TestAgent/1.0"));
        assert_eq!(options.proxy_server().as_deref(), Some("http://10.0.0.1:8080"));
        assert_eq!(options.request_timeout, Duration::from_millis(config.navigation_timeout_ms));
    }

    #[test]
    fn proxy_scheme_is_preserved() {
        let options = LaunchOptions::from_config(
            &BrowserConfig::default(),
            Some("socks5://127.0.0.1:1080".to_string()),
        );
        assert_eq!(options.proxy_server().as_deref(), Some("socks5://127.0.0.1:1080"));
        assert_eq!(LaunchOptions::from_config(&BrowserConfig::default(), None).proxy_server(), None);
    }
}
