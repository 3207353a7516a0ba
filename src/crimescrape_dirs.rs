//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate locations.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Config | `~/Library/Application Support/crimescrape/` | `~/.config/crimescrape/` |
//! | Cache | `~/Library/Caches/crimescrape/` | `~/.cache/crimescrape/` |
//!
//! Override with `CRIMESCRAPE_CONFIG_DIR` and `CRIMESCRAPE_CACHE_DIR`.

use std::path::PathBuf;

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CRIMESCRAPE_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("crimescrape"))
        .unwrap_or_else(|| PathBuf::from("/tmp/crimescrape-config"))
}

/// Application cache directory.
#[must_use]
pub fn cache_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CRIMESCRAPE_CACHE_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::cache_dir()
        .map(|d| d.join("crimescrape"))
        .unwrap_or_else(|| PathBuf::from("/tmp/crimescrape-cache"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Mirrored lookup results (`cache_dir()/results/`).
#[must_use]
pub fn results_cache_dir() -> PathBuf {
    cache_dir().join("results")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_is_toml_in_config_dir() {
        let file = config_file();
        assert!(file.starts_with(config_dir()));
        assert_eq!(file.file_name().and_then(|n| n.to_str()), Some("config.toml"));
    }

    #[test]
    fn results_cache_is_under_cache_dir() {
        assert!(results_cache_dir().starts_with(cache_dir()));
    }
}
