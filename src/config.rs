// Global configuration defaults and the environment-driven tracker config.

use std::time::Duration;
use thiserror::Error;

pub struct Config;

impl Config {
    // Scheduling policy
    pub const SUCCESS_INTERVAL_SECS: u64 = 20 * 60;
    pub const FAILURE_BACKOFF_SECS: u64 = 5 * 60;
    pub const DROP_THRESHOLD: f64 = 0.90;
    pub const HISTORY_CAP: usize = 120;

    // HTTP/Network config
    pub const FETCH_TIMEOUT_SECS: u64 = 20;
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    pub const MAX_CONTENT_SIZE: usize = 10 * 1024 * 1024; // 10MB
    pub const MAX_REDIRECTS: usize = 10;
    pub const USER_AGENT: &'static str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
    pub const ACCEPT_LANGUAGE: &'static str = "tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7";

    // Politeness
    pub const CONCURRENCY: usize = 3;
    pub const DELAY_MIN_MS: u64 = 800;
    pub const DELAY_MAX_MS: u64 = 1500;

    // Storage
    pub const DB_FILE_NAME: &'static str = "pricewatch.redb";

    // Push delivery
    pub const PUSH_TIMEOUT_SECS: u64 = 10;
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("drop threshold must be in (0, 1], got {0}")]
    DropThreshold(f64),

    #[error("history cap must be at least 1")]
    HistoryCap,

    #[error("concurrency must be at least 1")]
    Concurrency,

    #[error("politeness delay min ({min}ms) exceeds max ({max}ms)")]
    DelayRange { min: u64, max: u64 },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Runtime knobs for a tracking pass.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub success_interval: Duration,
    pub failure_backoff: Duration,
    pub drop_threshold: f64,
    pub history_cap: usize,
    pub fetch_timeout: Duration,
    pub concurrency: usize,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub user_agent: String,
    pub accept_language: String,
    pub push_endpoint: Option<String>,
    pub push_api_key: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            success_interval: Duration::from_secs(Config::SUCCESS_INTERVAL_SECS),
            failure_backoff: Duration::from_secs(Config::FAILURE_BACKOFF_SECS),
            drop_threshold: Config::DROP_THRESHOLD,
            history_cap: Config::HISTORY_CAP,
            fetch_timeout: Duration::from_secs(Config::FETCH_TIMEOUT_SECS),
            concurrency: Config::CONCURRENCY,
            delay_min_ms: Config::DELAY_MIN_MS,
            delay_max_ms: Config::DELAY_MAX_MS,
            user_agent: Config::USER_AGENT.to_string(),
            accept_language: Config::ACCEPT_LANGUAGE.to_string(),
            push_endpoint: None,
            push_api_key: None,
        }
    }
}

impl TrackerConfig {
    /// Build the config from `PRICEWATCH_*` environment variables.
    /// Unset or unparsable values fall back to the defaults in [`Config`].
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let secs = |key: &str, default: u64| {
            Duration::from_secs(parsed(key).and_then(|v| v.parse::<u64>().ok()).unwrap_or(default))
        };
        let defaults = Self::default();

        Self {
            success_interval: secs("PRICEWATCH_SUCCESS_INTERVAL_SECS", Config::SUCCESS_INTERVAL_SECS),
            failure_backoff: secs("PRICEWATCH_FAILURE_BACKOFF_SECS", Config::FAILURE_BACKOFF_SECS),
            drop_threshold: parsed("PRICEWATCH_DROP_THRESHOLD")
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(defaults.drop_threshold),
            history_cap: parsed("PRICEWATCH_HISTORY_CAP")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(defaults.history_cap),
            fetch_timeout: secs("PRICEWATCH_FETCH_TIMEOUT_SECS", Config::FETCH_TIMEOUT_SECS),
            concurrency: parsed("PRICEWATCH_CONCURRENCY")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(defaults.concurrency),
            delay_min_ms: parsed("PRICEWATCH_DELAY_MIN_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.delay_min_ms),
            delay_max_ms: parsed("PRICEWATCH_DELAY_MAX_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.delay_max_ms),
            user_agent: parsed("PRICEWATCH_USER_AGENT").unwrap_or(defaults.user_agent),
            accept_language: parsed("PRICEWATCH_ACCEPT_LANGUAGE").unwrap_or(defaults.accept_language),
            push_endpoint: parsed("PRICEWATCH_PUSH_ENDPOINT"),
            push_api_key: parsed("PRICEWATCH_PUSH_API_KEY"),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.drop_threshold > 0.0 && self.drop_threshold <= 1.0) {
            return Err(ConfigError::DropThreshold(self.drop_threshold));
        }
        if self.history_cap == 0 {
            return Err(ConfigError::HistoryCap);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Concurrency);
        }
        if self.delay_min_ms > self.delay_max_ms {
            return Err(ConfigError::DelayRange {
                min: self.delay_min_ms,
                max: self.delay_max_ms,
            });
        }
        if self.success_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("success interval"));
        }
        if self.failure_backoff.is_zero() {
            return Err(ConfigError::ZeroDuration("failure backoff"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("fetch timeout"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.success_interval, Duration::from_secs(1200));
        assert_eq!(config.failure_backoff, Duration::from_secs(300));
        assert_eq!(config.drop_threshold, 0.90);
        assert_eq!(config.history_cap, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = TrackerConfig::from_lookup(lookup_from(&[
            ("PRICEWATCH_SUCCESS_INTERVAL_SECS", "60"),
            ("PRICEWATCH_DROP_THRESHOLD", "0.8"),
            ("PRICEWATCH_HISTORY_CAP", "10"),
            ("PRICEWATCH_PUSH_ENDPOINT", "https://push.test/send"),
        ]));
        assert_eq!(config.success_interval, Duration::from_secs(60));
        assert_eq!(config.drop_threshold, 0.8);
        assert_eq!(config.history_cap, 10);
        assert_eq!(config.push_endpoint.as_deref(), Some("https://push.test/send"));
        assert_eq!(config.failure_backoff, Duration::from_secs(Config::FAILURE_BACKOFF_SECS));
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = TrackerConfig::from_lookup(lookup_from(&[
            ("PRICEWATCH_CONCURRENCY", "lots"),
            ("PRICEWATCH_PUSH_ENDPOINT", "   "),
        ]));
        assert_eq!(config.concurrency, Config::CONCURRENCY);
        assert!(config.push_endpoint.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TrackerConfig::default();
        config.drop_threshold = 1.5;
        assert_eq!(config.validate(), Err(ConfigError::DropThreshold(1.5)));

        let mut config = TrackerConfig::default();
        config.history_cap = 0;
        assert_eq!(config.validate(), Err(ConfigError::HistoryCap));

        let mut config = TrackerConfig::default();
        config.delay_min_ms = 2000;
        config.delay_max_ms = 100;
        assert!(matches!(config.validate(), Err(ConfigError::DelayRange { .. })));
    }
}
