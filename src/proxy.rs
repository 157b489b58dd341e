//! Proxy list loading and selection
//!
//! Sources, in order: `proxies.txt` in the working directory (one `ip:port`
//! per line), then the comma-separated `PROXY_LIST` environment variable.

use std::fs;
use std::path::Path;

use rand::seq::IndexedRandom;
use tracing::{info, warn};

pub const PROXY_FILE: &str = "proxies.txt";
pub const PROXY_ENV: &str = "PROXY_LIST";

/// Entries of a proxy file, blank lines and `#` comments skipped
pub fn parse_proxy_file(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Entries of a comma-separated proxy list
pub fn parse_proxy_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load proxies from `file`, falling back to `env_value` when the file is absent
pub fn load_proxies_from(file: &Path, env_value: Option<&str>) -> Vec<String> {
    if file.exists() {
        match fs::read_to_string(file) {
            Ok(contents) => {
                let proxies = parse_proxy_file(&contents);
                info!("Loaded {} proxies from {}", proxies.len(), file.display());
                return proxies;
            }
            Err(e) => warn!("Failed to read {}: {}", file.display(), e),
        }
    }

    match env_value {
        Some(value) => {
            let proxies = parse_proxy_list(value);
            info!("Loaded {} proxies from {}", proxies.len(), PROXY_ENV);
            proxies
        }
        None => Vec::new(),
    }
}

/// Load proxies from the default file and environment variable
pub fn load_proxies() -> Vec<String> {
    let env_value = std::env::var(PROXY_ENV).ok();
    let proxies = load_proxies_from(Path::new(PROXY_FILE), env_value.as_deref());
    if proxies.is_empty() {
        warn!("No proxies found. Running without proxies.");
    }
    proxies
}

/// Pick one proxy at random
pub fn choose_proxy(proxies: &[String]) -> Option<String> {
    proxies.choose(&mut rand::rng()).cloned()
}
