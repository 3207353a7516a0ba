//! Search configuration with sensible defaults.
//!
//! [`SearchConfig`] controls fan-out concurrency, timeouts, caching,
//! browser behaviour and the optional per-module circuit breaker. The defaults are
//! tuned for slow, unreliable upstream sites.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Configuration for the orchestrator, fetch engines and cache.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour. Missing fields in a TOML/JSON
/// document fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of source modules running at the same time.
    pub max_concurrency: usize,
    /// Per-request timeout for fetch engines, in seconds.
    pub fetch_timeout_seconds: u64,
    /// Overall deadline for one orchestrator run, in seconds. Modules still
    /// running at the deadline contribute no result.
    pub run_timeout_seconds: u64,
    /// Whether lookups consult and populate the cache.
    pub cache_enabled: bool,
    /// Age in seconds up to which a cached result counts as fresh.
    pub cache_ttl_seconds: u64,
    /// Age in seconds after which a stale entry is dropped instead of served.
    pub cache_max_age_seconds: u64,
    /// Maximum number of cached query results held in memory.
    pub cache_max_entries: u64,
    /// Directory mirroring cache entries as JSON files. `None` keeps the
    /// cache in memory only.
    pub cache_dir: Option<PathBuf>,
    /// Re-run the search in the background when a stale entry is served.
    pub refresh_stale: bool,
    /// Run the stealth engine's browser without a visible window.
    pub headless: bool,
    /// Custom User-Agent string. If `None`, rotates through a built-in list
    /// of realistic browser User-Agents.
    pub user_agent: Option<String>,
    /// Browser viewport `(width, height)` for the stealth engine.
    pub viewport: (u32, u32),
    /// Skip modules that keep failing. Off by default: every registered
    /// module runs on every query.
    pub breaker_enabled: bool,
    /// Consecutive failures before a module's circuit opens.
    pub breaker_failure_threshold: u32,
    /// Seconds an open circuit waits before allowing a single trial run.
    pub breaker_cooldown_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            fetch_timeout_seconds: 30,
            run_timeout_seconds: 60,
            cache_enabled: true,
            cache_ttl_seconds: 24 * 60 * 60,
            cache_max_age_seconds: 5 * 24 * 60 * 60,
            cache_max_entries: 1_000,
            cache_dir: None,
            refresh_stale: true,
            headless: true,
            user_agent: None,
            viewport: (1280, 720),
            breaker_enabled: false,
            breaker_failure_threshold: 3,
            breaker_cooldown_secs: 300,
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `max_concurrency` must be greater than 0
    /// - `fetch_timeout_seconds` and `run_timeout_seconds` must be greater than 0
    /// - `cache_max_entries` must be greater than 0
    /// - `cache_max_age_seconds` must be >= `cache_ttl_seconds`
    /// - `breaker_failure_threshold` must be greater than 0
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_concurrency == 0 {
            return Err(SearchError::Config(
                "max_concurrency must be greater than 0".into(),
            ));
        }
        if self.fetch_timeout_seconds == 0 {
            return Err(SearchError::Config(
                "fetch_timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.run_timeout_seconds == 0 {
            return Err(SearchError::Config(
                "run_timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.cache_max_entries == 0 {
            return Err(SearchError::Config(
                "cache_max_entries must be greater than 0".into(),
            ));
        }
        if self.cache_max_age_seconds < self.cache_ttl_seconds {
            return Err(SearchError::Config(
                "cache_max_age_seconds must be >= cache_ttl_seconds".into(),
            ));
        }
        if self.breaker_failure_threshold == 0 {
            return Err(SearchError::Config(
                "breaker_failure_threshold must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let config = SearchConfig::default();
        assert_eq!(config.max_concurrency, 5);
        assert_eq!(config.fetch_timeout_seconds, 30);
        assert!(config.cache_enabled);
        assert_eq!(config.cache_ttl_seconds, 86_400);
        assert_eq!(config.cache_max_age_seconds, 432_000);
        assert!(config.cache_dir.is_none());
        assert!(!config.breaker_enabled);
        assert!(config.headless);
        assert!(config.user_agent.is_none());
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let config = SearchConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));
    }

    #[test]
    fn zero_timeouts_rejected() {
        let config = SearchConfig {
            fetch_timeout_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("fetch_timeout"));

        let config = SearchConfig {
            run_timeout_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("run_timeout"));
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = SearchConfig {
            cache_max_entries: 0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("cache_max_entries"));
    }

    #[test]
    fn max_age_below_ttl_rejected() {
        let config = SearchConfig {
            cache_ttl_seconds: 100,
            cache_max_age_seconds: 50,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("max_age"));
    }

    #[test]
    fn zero_ttl_valid() {
        let config = SearchConfig {
            cache_ttl_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_document_uses_defaults() {
        let config: SearchConfig =
            serde_json::from_str(r#"{"max_concurrency": 2, "headless": false}"#).expect("parse");
        assert_eq!(config.max_concurrency, 2);
        assert!(!config.headless);
        assert_eq!(config.fetch_timeout_seconds, 30);
    }

    #[test]
    fn durations_follow_seconds() {
        let config = SearchConfig {
            fetch_timeout_seconds: 7,
            run_timeout_seconds: 9,
            ..Default::default()
        };
        assert_eq!(config.fetch_timeout(), Duration::from_secs(7));
        assert_eq!(config.run_timeout(), Duration::from_secs(9));
    }
}
