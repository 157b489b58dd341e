//! Timeout validation for browser operations

use std::time::Duration;

use super::errors::ConfigError;

/// Maximum timeout for navigation and readiness waits (5 minutes)
pub const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000;

/// Validate a navigation or readiness timeout
///
/// # Errors
/// [`ConfigError::InvalidValue`] for zero or for anything above
/// [`MAX_NAVIGATION_TIMEOUT_MS`].
pub fn validate_navigation_timeout(name: &str, ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::InvalidValue(format!("{name} must be greater than 0ms")));
    }

    if ms > MAX_NAVIGATION_TIMEOUT_MS {
        return Err(ConfigError::InvalidValue(format!(
            "{name} cannot exceed {}ms ({} minutes). Received: {}ms ({:.1} minutes)",
            MAX_NAVIGATION_TIMEOUT_MS,
            MAX_NAVIGATION_TIMEOUT_MS / 60_000,
            ms,
            ms as f64 / 60_000.0
        )));
    }

    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bounded_timeouts() {
        assert_eq!(
            validate_navigation_timeout("ready_timeout_ms", 10_000).unwrap(),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn rejects_zero_and_oversized() {
        assert!(validate_navigation_timeout("ready_timeout_ms", 0).is_err());
        let err = validate_navigation_timeout("navigation_timeout_ms", 300_001).unwrap_err();
        assert!(err.to_string().contains("cannot exceed 300000ms"));
    }
}
