//! # crimescrape-search
//!
//! Person lookups across public watch lists (wanted lists, sanctions lists,
//! police notices), aggregated into one canonical result per query.
//!
//! ## Design
//!
//! - Each upstream is a [`SourceModule`] that fetches through a
//!   [`FetchEngine`]: plain HTTP or a real browser session
//! - The [`Orchestrator`] runs every module concurrently under a deadline;
//!   one failing site never blocks the others
//! - Results are keyed by module name in an [`AggregateResult`] with a fixed
//!   JSON shape (`risk` plus `notices`)
//! - [`CrimeScrape`] adds a staleness-aware cache with single-flight live
//!   runs and an optional on-disk mirror
//!
//! ## Privacy
//!
//! - Queried names are logged only at trace level
//! - No network listeners; this is a library

pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod fetch;
pub mod html;
pub mod matching;
pub mod merge;
pub mod orchestrator;
pub mod response;
pub mod service;
pub mod source;
pub mod sources;
pub mod types;

pub use cache::{CacheHit, Clock, ManualClock, ResultCache, SystemClock};
pub use config::SearchConfig;
pub use error::{Result, SearchError};
pub use fetch::{FetchEngine, FetchOptions, LightEngine, StealthEngine};
pub use orchestrator::{DiagnosticKind, ModuleDiagnostic, Orchestrator, RunReport};
pub use service::{CachePolicy, CrimeScrape, Lookup, SearchResponse};
pub use source::{ModuleRegistry, SourceModule};
pub use types::{AggregateResult, Notice, Query, RiskLevel, SourceResult, Status};

/// Look a person up across every built-in module, without caching.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if `config` is invalid, or
/// [`SearchError::Http`] if an engine cannot be constructed.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> crimescrape_search::Result<()> {
/// let query = crimescrape_search::Query::new("Ruja", "Ignatova")?;
/// let config = crimescrape_search::SearchConfig::default();
/// let result = crimescrape_search::search(&query, &config).await?;
/// for (module, found) in result.iter() {
///     println!("{module}: {}", found.risk);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn search(query: &Query, config: &SearchConfig) -> Result<AggregateResult> {
    config.validate()?;
    let registry = sources::default_registry(config)?;
    let orchestrator = Orchestrator::new(registry, config)?;
    Ok(orchestrator.run(query).await)
}
