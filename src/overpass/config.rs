use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use crate::state::env_or;

/// Overpass client settings, sourced from the environment (`.env` honored).
#[derive(Debug, Clone)]
pub struct OverpassConfig {
    /// Base URL without the `/api/interpreter` path.
    pub base_url: String,
    pub timeout: Duration,
    /// Global ceiling shared by every caller of one client.
    pub rps_limit: f64,
    /// Retries after the first attempt, on connect/timeout errors only.
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            base_url: "https://overpass-api.de".to_string(),
            timeout: Duration::from_secs(120),
            rps_limit: 1.0,
            retry_attempts: 3,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

impl OverpassConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let base_url = dotenv::var("OVERPASS_BASE_URL").unwrap_or(defaults.base_url);
        let timeout_s: f64 = env_or("OVERPASS_TIMEOUT_S", 120.0)?;
        let rps_limit: f64 = env_or("OVERPASS_RPS_LIMIT", defaults.rps_limit)?;
        let retry_attempts: u32 = env_or("OVERPASS_RETRY_ATTEMPTS", defaults.retry_attempts)?;
        let backoff_s: f64 = env_or("OVERPASS_RETRY_BACKOFF_S", 2.0)?;

        if !(rps_limit.is_finite() && rps_limit > 0.0) {
            bail!("OVERPASS_RPS_LIMIT must be a positive number, got {}", rps_limit);
        }
        if !(timeout_s.is_finite() && timeout_s > 0.0) {
            bail!("OVERPASS_TIMEOUT_S must be a positive number, got {}", timeout_s);
        }
        if !(backoff_s.is_finite() && backoff_s >= 0.0) {
            bail!("OVERPASS_RETRY_BACKOFF_S must be >= 0, got {}", backoff_s);
        }

        // Reject values that pass the sign checks but overflow a Duration.
        seconds("OVERPASS_RPS_LIMIT", 1.0 / rps_limit)?;

        Ok(Self {
            base_url,
            timeout: seconds("OVERPASS_TIMEOUT_S", timeout_s)?,
            rps_limit,
            retry_attempts,
            retry_backoff: seconds("OVERPASS_RETRY_BACKOFF_S", backoff_s)?,
        })
    }

    /// The interpreter endpoint every query is posted to.
    pub fn endpoint(&self) -> String {
        format!("{}/api/interpreter", self.base_url.trim_end_matches('/'))
    }
}

fn seconds(key: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| anyhow!("{} is out of range ({} s): {}", key, value, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let config = OverpassConfig {
            base_url: "https://overpass.example.org/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "https://overpass.example.org/api/interpreter");
    }

    #[test]
    fn test_defaults() {
        let config = OverpassConfig::default();
        assert_eq!(config.rps_limit, 1.0);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_backoff, Duration::from_secs(2));
        assert_eq!(config.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_out_of_range_durations_are_rejected() {
        let err = seconds("OVERPASS_RPS_LIMIT", 1.0 / 1e-20).unwrap_err();
        assert!(err.to_string().contains("OVERPASS_RPS_LIMIT"));
        assert!(seconds("OVERPASS_TIMEOUT_S", 1e300).is_err());
        assert!(seconds("OVERPASS_RETRY_BACKOFF_S", f64::INFINITY).is_err());
        assert_eq!(seconds("OVERPASS_TIMEOUT_S", 1.5).unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn test_from_env_rejects_tiny_rps_limit() {
        std::env::set_var("OVERPASS_RPS_LIMIT", "1e-20");
        let result = OverpassConfig::from_env();
        std::env::remove_var("OVERPASS_RPS_LIMIT");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("OVERPASS_RPS_LIMIT"));
    }
}
