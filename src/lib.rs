//! crimescrape front end: configuration, logging and batch lookups on top
//! of [`crimescrape_search`].

pub mod config;
pub mod crimescrape_dirs;
pub mod error;
pub mod logging;
pub mod standalone;

pub use config::{AppConfig, LoggingConfig, Overrides};
pub use error::{AppError, Result};
pub use standalone::{read_query, run_standalone, write_results};

pub use crimescrape_search as search;
