//! Error types for the crimescrape-search crate.
//!
//! Source modules fail only through [`SearchError::Schema`],
//! [`SearchError::Captcha`] and [`SearchError::Module`]. Transport failures
//! ([`SearchError::Http`]) never leave a fetch engine: they are logged and
//! turned into empty content. A cache miss is `None`, not an error.

/// Errors that can occur while searching, validating or caching results.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// A constructed or externally supplied result violates the canonical shape.
    #[error("schema error: {0}")]
    Schema(String),

    /// A module ran into a CAPTCHA or bot wall it cannot get past.
    #[error("captcha detected: {0}")]
    Captcha(String),

    /// Any other failure inside a source module's own logic.
    #[error("module failure: {0}")]
    Module(String),

    /// A network or browser-automation request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The query could not be normalised into a usable first/last name pair.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid search configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The local cache mirror could not be read or written.
    #[error("cache error: {0}")]
    Cache(String),
}

impl SearchError {
    /// Short machine-friendly name of the error kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema(_) => "schema",
            Self::Captcha(_) => "captcha",
            Self::Module(_) => "module",
            Self::Http(_) => "http",
            Self::InvalidQuery(_) => "invalid_query",
            Self::Config(_) => "config",
            Self::Cache(_) => "cache",
        }
    }
}

/// Convenience type alias for crimescrape-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
