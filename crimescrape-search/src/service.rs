//! The public entry point: live runs, cached lookups and the response
//! envelope handed to transport layers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::cache::{CacheHit, Clock, ResultCache, SystemClock};
use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::orchestrator::{DiagnosticKind, Orchestrator, RunReport};
use crate::source::ModuleRegistry;
use crate::types::{AggregateResult, Query, Status};

/// Whether a lookup may be answered from the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Serve a cached entry (fresh or stale) when one exists.
    #[default]
    Use,
    /// Always run live; the result still refreshes the cache.
    Bypass,
}

/// A lookup answer and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lookup {
    pub data: AggregateResult,
    pub status: Status,
}

impl Lookup {
    fn fresh(data: AggregateResult) -> Self {
        Self {
            data,
            status: Status::Fresh,
        }
    }

    fn cached(hit: CacheHit) -> Self {
        Self {
            data: (*hit.value).clone(),
            status: Status::Cached,
        }
    }
}

/// Transport envelope: `{"status", "data"}` or `{"status": "error", "info"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Data { status: Status, data: AggregateResult },
    Error { status: Status, info: String },
}

impl SearchResponse {
    pub fn from_result(result: Result<Lookup>) -> Self {
        match result {
            Ok(lookup) => Self::Data {
                status: lookup.status,
                data: lookup.data,
            },
            Err(e) => Self::error(e.to_string()),
        }
    }

    pub fn error(info: impl Into<String>) -> Self {
        Self::Error {
            status: Status::Error,
            info: info.into(),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Data { status, .. } | Self::Error { status, .. } => *status,
        }
    }
}

/// Orchestrator plus result cache.
///
/// Cloning is cheap and clones share the cache, the circuit breakers and
/// the in-flight registry.
#[derive(Clone)]
pub struct CrimeScrape {
    inner: Arc<Inner>,
}

struct Inner {
    orchestrator: Orchestrator,
    cache: Option<ResultCache>,
    refresh_stale: bool,
    in_flight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl CrimeScrape {
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `config` fails validation.
    pub fn new(registry: ModuleRegistry, config: &SearchConfig) -> Result<Self> {
        Self::with_clock(registry, config, Arc::new(SystemClock))
    }

    /// Like [`CrimeScrape::new`], with cache freshness driven by `clock`.
    ///
    /// # Errors
    ///
    /// Same as [`CrimeScrape::new`].
    pub fn with_clock(
        registry: ModuleRegistry,
        config: &SearchConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let orchestrator = Orchestrator::new(registry, config)?;
        let cache = config
            .cache_enabled
            .then(|| ResultCache::with_clock(config, clock));
        tracing::debug!(
            modules = ?orchestrator.registry().names(),
            cache = cache.is_some(),
            "crimescrape initialised"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                orchestrator,
                cache,
                refresh_stale: config.refresh_stale,
                in_flight: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.inner.orchestrator
    }

    /// `None` when caching is disabled.
    pub fn cache(&self) -> Option<&ResultCache> {
        self.inner.cache.as_ref()
    }

    /// Run every module live, bypassing the cache entirely.
    pub async fn run(&self, query: &Query) -> AggregateResult {
        self.inner.orchestrator.run(query).await
    }

    /// Live run with per-module diagnostics.
    pub async fn run_with_report(&self, query: &Query) -> RunReport {
        self.inner.orchestrator.run_with_report(query).await
    }

    /// Answer from the cache when allowed, otherwise run live and store.
    ///
    /// A stale hit is served as [`Status::Cached`] and, with
    /// `refresh_stale`, triggers a background re-run. Concurrent live runs
    /// for the same query are collapsed into one; later callers wait and
    /// read the stored result.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Module`] if the live run task itself dies
    /// (a module panicked).
    pub async fn lookup_or_run(&self, query: &Query, policy: CachePolicy) -> Result<Lookup> {
        let Some(cache) = self.cache() else {
            return Ok(Lookup::fresh(self.run(query).await));
        };

        if policy == CachePolicy::Use {
            if let Some(hit) = cache.lookup(query).await {
                if !hit.fresh && self.inner.refresh_stale {
                    self.spawn_refresh(query.clone());
                }
                return Ok(Lookup::cached(hit));
            }
        }

        // Detached so a caller giving up does not abort a run others wait on.
        let this = self.clone();
        let query = query.clone();
        tokio::spawn(async move { this.run_single_flight(&query).await })
            .await
            .map_err(|e| SearchError::Module(format!("search task failed: {e}")))
    }

    async fn run_single_flight(&self, query: &Query) -> Lookup {
        let key = query.cache_key();
        let (flight, waited) = self.begin_flight(&key).await;

        if waited {
            if let Some(hit) = self.lookup_cached(query).await {
                tracing::debug!("served result of concurrent run");
                return Lookup::cached(hit);
            }
        }

        let data = self.run_and_store(query).await;
        drop(flight);
        Lookup::fresh(data)
    }

    /// Live run whose aggregate is cached unless the circuit breaker
    /// skipped a module.
    async fn run_and_store(&self, query: &Query) -> AggregateResult {
        let report = self.run_with_report(query).await;
        let skipped = report.modules_with(DiagnosticKind::Skipped);
        match self.cache() {
            Some(cache) if skipped.is_empty() => {
                cache.store(query, report.result.clone()).await;
            }
            Some(_) => tracing::debug!(?skipped, "partial result not cached"),
            None => {}
        }
        report.result
    }

    fn spawn_refresh(&self, query: Query) {
        let this = self.clone();
        tokio::spawn(async move {
            let key = query.cache_key();
            let Some(_flight) = this.try_begin_flight(&key) else {
                tracing::debug!("refresh already in progress");
                return;
            };
            tracing::debug!("refreshing stale cache entry");
            this.run_and_store(&query).await;
        });
    }

    async fn lookup_cached(&self, query: &Query) -> Option<CacheHit> {
        self.cache()?.lookup(query).await
    }

    /// Join the in-flight run for `key`, waiting if another task owns it.
    /// The flag reports whether we had to wait.
    async fn begin_flight(&self, key: &str) -> (Flight<'_>, bool) {
        let gate = self.gate(key);
        match Arc::clone(&gate).try_lock_owned() {
            Ok(held) => (Flight::new(&self.inner, key, gate, held), false),
            Err(_) => {
                let held = Arc::clone(&gate).lock_owned().await;
                (Flight::new(&self.inner, key, gate, held), true)
            }
        }
    }

    fn try_begin_flight(&self, key: &str) -> Option<Flight<'_>> {
        let gate = self.gate(key);
        let held = Arc::clone(&gate).try_lock_owned().ok()?;
        Some(Flight::new(&self.inner, key, gate, held))
    }

    fn gate(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock_in_flight();
        Arc::clone(map.entry(key.to_string()).or_default())
    }
}

impl std::fmt::Debug for CrimeScrape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrimeScrape")
            .field("orchestrator", &self.inner.orchestrator)
            .field("cache", &self.inner.cache)
            .field("refresh_stale", &self.inner.refresh_stale)
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Ownership of one key's live run. Dropping it releases waiters and
/// forgets the key once nobody else holds its gate.
struct Flight<'a> {
    owner: &'a Inner,
    key: String,
    gate: Arc<AsyncMutex<()>>,
    held: Option<OwnedMutexGuard<()>>,
}

impl<'a> Flight<'a> {
    fn new(owner: &'a Inner, key: &str, gate: Arc<AsyncMutex<()>>, held: OwnedMutexGuard<()>) -> Self {
        Self {
            owner,
            key: key.to_string(),
            gate,
            held: Some(held),
        }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        self.held.take();
        let mut map = self.owner.lock_in_flight();
        // One reference in the map, one here.
        if Arc::strong_count(&self.gate) <= 2 {
            map.remove(&self.key);
        }
    }
}
