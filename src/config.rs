//! Front-end configuration: a TOML file with `[search]` and `[logging]`
//! sections, overlaid with command-line overrides.
//!
//! ```toml
//! persist_cache = true
//!
//! [search]
//! max_concurrency = 5
//! run_timeout_seconds = 60
//! headless = true
//!
//! [logging]
//! filter = "crimescrape=debug"
//! file = "crimescrape.log"
//! ```

use std::path::{Path, PathBuf};

use crimescrape_search::SearchConfig;
use serde::{Deserialize, Serialize};

use crate::crimescrape_dirs;
use crate::error::{AppError, Result};

/// Default `tracing` filter when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "crimescrape=info,crimescrape_search=info";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Mirror cached results to disk when `search.cache_dir` is unset.
    pub persist_cache: bool,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            persist_cache: true,
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Where and how much to log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    pub filter: Option<String>,
    /// Log file, truncated at start. Logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

/// Command-line settings that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub headless: Option<bool>,
    pub threads: Option<usize>,
    pub nocache: bool,
    pub timeout: Option<u64>,
    pub log_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("invalid {}: {e}", path.display())))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crimescrape_dirs::config_file()
    }

    /// Load `explicit` if given (it must exist), otherwise the default
    /// file if present, otherwise defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let default_path = Self::default_config_path();
        if default_path.is_file() {
            tracing::debug!(path = %default_path.display(), "loading config");
            Self::from_file(&default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(headless) = overrides.headless {
            self.search.headless = headless;
        }
        if let Some(threads) = overrides.threads {
            self.search.max_concurrency = threads;
        }
        if overrides.nocache {
            self.search.cache_enabled = false;
        }
        if let Some(timeout) = overrides.timeout {
            self.search.run_timeout_seconds = timeout;
        }
        if let Some(file) = &overrides.log_file {
            self.logging.file = Some(file.clone());
        }
    }

    /// Search settings for a batch run: the disk cache location resolved and
    /// background refresh of stale hits off, since the process exits once
    /// results are written.
    ///
    /// # Errors
    ///
    /// Returns an error if the search settings fail validation.
    pub fn resolved_search(&self) -> Result<SearchConfig> {
        let mut search = self.search.clone();
        if self.persist_cache && search.cache_enabled && search.cache_dir.is_none() {
            search.cache_dir = Some(crimescrape_dirs::results_cache_dir());
        }
        search.refresh_stale = false;
        search.validate()?;
        Ok(search)
    }
}
