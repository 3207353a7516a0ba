//! Error types for the crimescrape front end.

use crimescrape_search::SearchError;

/// Top-level error type for the command-line front end.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration file missing, unreadable or invalid.
    #[error("config error: {0}")]
    Config(String),

    /// The query file could not be read or does not describe a person.
    #[error("query error: {0}")]
    Query(String),

    /// Search engine construction or lookup error.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Logging could not be initialised.
    #[error("logging error: {0}")]
    Logging(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_errors_display_unchanged() {
        let err = AppError::from(SearchError::Config("max_concurrency must be greater than 0".into()));
        assert_eq!(err.to_string(), "config error: max_concurrency must be greater than 0");
    }

    #[test]
    fn io_errors_convert() {
        let err = AppError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(matches!(err, AppError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: gone");
    }
}
