//! Query result cache with staleness tracking.
//!
//! Aggregates are keyed by [`Query::cache_key`] and held in a
//! capacity-bounded [`moka`] cache. Freshness is not delegated to moka's
//! expiry: every lookup compares the entry's `fetched_at` with the injected
//! [`Clock`], so a result past its TTL is still served (marked stale) until
//! it reaches the hard maximum age, at which point it is dropped.
//!
//! When a cache directory is configured, each entry is mirrored to
//! `<cache_dir>/<sha256(key)>.json` so results survive restarts. Disk
//! problems are logged and the cache carries on in memory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::types::{AggregateResult, Query};

/// Source of "now" for freshness decisions.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used to exercise TTL behaviour.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: std::time::Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = now.checked_add_signed(delta).unwrap_or(*now);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One cached aggregate plus its freshness metadata.
#[derive(Debug)]
pub struct CacheEntry {
    pub key: String,
    pub value: Arc<AggregateResult>,
    /// When the live run that produced `value` completed.
    pub fetched_at: DateTime<Utc>,
    /// Milliseconds since the epoch of the last staleness check.
    last_validated_at: AtomicI64,
}

impl CacheEntry {
    fn new(key: String, value: Arc<AggregateResult>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            key,
            value,
            fetched_at,
            last_validated_at: AtomicI64::new(fetched_at.timestamp_millis()),
        }
    }

    /// When a lookup last checked this entry's freshness.
    pub fn last_validated_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_validated_at.load(Ordering::Relaxed))
            .unwrap_or(self.fetched_at)
    }

    fn mark_validated(&self, at: DateTime<Utc>) {
        self.last_validated_at
            .store(at.timestamp_millis(), Ordering::Relaxed);
    }
}

/// A successful lookup.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub value: Arc<AggregateResult>,
    /// `false` once the entry is older than the TTL.
    pub fresh: bool,
    pub fetched_at: DateTime<Utc>,
}

/// On-disk shape of a mirrored entry.
#[derive(Serialize, Deserialize)]
struct DiskEntry {
    key: String,
    fetched_at: DateTime<Utc>,
    last_validated_at: DateTime<Utc>,
    value: AggregateResult,
}

/// Capacity-bounded result cache keyed by normalised query.
pub struct ResultCache {
    entries: Cache<String, Arc<CacheEntry>>,
    ttl: TimeDelta,
    max_age: TimeDelta,
    dir: Option<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    /// Cache driven by wall-clock time.
    pub fn new(config: &SearchConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &SearchConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(config.cache_max_entries)
                .build(),
            ttl: seconds(config.cache_ttl_seconds),
            max_age: seconds(config.cache_max_age_seconds),
            dir: config.cache_dir.clone(),
            clock,
        }
    }

    /// Look up the cached aggregate for `query`.
    ///
    /// Returns `None` on a miss, including entries older than the maximum
    /// age (which are evicted on the way out).
    pub async fn lookup(&self, query: &Query) -> Option<CacheHit> {
        let key = query.cache_key();
        let entry = match self.entries.get(&key).await {
            Some(entry) => entry,
            None => self.reload(&key).await?,
        };

        let now = self.clock.now();
        let age = now.signed_duration_since(entry.fetched_at);
        if age > self.max_age {
            tracing::debug!(age_secs = age.num_seconds(), "cache entry past max age, evicting");
            self.evict(&key, &entry).await;
            return None;
        }

        entry.mark_validated(now);
        let fresh = age <= self.ttl;
        tracing::debug!(fresh, "cache hit");
        Some(CacheHit {
            value: Arc::clone(&entry.value),
            fresh,
            fetched_at: entry.fetched_at,
        })
    }

    /// Store `value` as the result of a live run for `query` completed now.
    ///
    /// Replaces any existing entry. A failing disk mirror is logged; the
    /// in-memory entry is kept either way.
    pub async fn store(&self, query: &Query, value: AggregateResult) -> Arc<AggregateResult> {
        let key = query.cache_key();
        let value = Arc::new(value);
        let dir = self.dir.as_deref();
        let stored = Arc::clone(&value);
        self.entries
            .entry(key.clone())
            .and_compute_with(|_| async move {
                let entry = Arc::new(CacheEntry::new(key, stored, self.clock.now()));
                if let Some(dir) = dir {
                    if let Err(e) = write_entry(dir, &entry).await {
                        tracing::warn!("cache mirror write failed: {e}");
                    }
                }
                Op::Put(entry)
            })
            .await;
        value
    }

    /// Drop any entry for `query`, in memory and on disk.
    pub async fn invalidate(&self, query: &Query) {
        let key = query.cache_key();
        let dir = self.dir.as_deref();
        self.entries
            .entry(key.clone())
            .and_compute_with(|_| async move {
                if let Some(dir) = dir {
                    remove_file(&entry_path(dir, &key)).await;
                }
                Op::Remove
            })
            .await;
    }

    /// The raw entry for `query`, without a freshness check.
    pub async fn entry(&self, query: &Query) -> Option<Arc<CacheEntry>> {
        self.entries.get(&query.cache_key()).await
    }

    /// Approximate number of entries held in memory.
    pub async fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    /// Load `key` from the disk mirror into memory, unless a concurrent
    /// `store` has already filled it.
    async fn reload(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.dir.as_ref()?;
        let outcome = self
            .entries
            .entry(key.to_string())
            .and_compute_with(|current| async move {
                if current.is_some() {
                    return Op::Nop;
                }
                match self.load_from_disk(key).await {
                    Some(entry) => Op::Put(Arc::new(entry)),
                    None => Op::Nop,
                }
            })
            .await;
        match outcome {
            CompResult::Inserted(entry)
            | CompResult::Unchanged(entry)
            | CompResult::ReplacedWith(entry) => Some(entry.into_value()),
            CompResult::Removed(_) | CompResult::StillNone(_) => None,
        }
    }

    /// Remove `seen` from memory and disk, but only if it is still the
    /// current entry for `key`.
    async fn evict(&self, key: &str, seen: &Arc<CacheEntry>) {
        let dir = self.dir.as_deref();
        self.entries
            .entry(key.to_string())
            .and_compute_with(|current| async move {
                match current {
                    Some(current) if Arc::ptr_eq(current.value(), seen) => {
                        if let Some(dir) = dir {
                            remove_file(&entry_path(dir, key)).await;
                        }
                        Op::Remove
                    }
                    _ => Op::Nop,
                }
            })
            .await;
    }

    async fn load_from_disk(&self, key: &str) -> Option<CacheEntry> {
        let dir = self.dir.as_ref()?;
        let path = entry_path(dir, key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), "cache file unreadable: {e}");
                return None;
            }
        };

        match serde_json::from_slice::<DiskEntry>(&bytes) {
            Ok(disk) if disk.key == key => {
                let entry = CacheEntry::new(disk.key, Arc::new(disk.value), disk.fetched_at);
                entry.mark_validated(disk.last_validated_at);
                Some(entry)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), "corrupt cache file removed: {e}");
                remove_file(&path).await;
                None
            }
        }
    }
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttl", &self.ttl)
            .field("max_age", &self.max_age)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

/// `<dir>/<sha256(key) as hex>.json`
pub fn entry_path(dir: &Path, key: &str) -> PathBuf {
    let digest = Sha256::digest(key.as_bytes());
    dir.join(format!("{}.json", hex::encode(digest)))
}

async fn write_entry(dir: &Path, entry: &CacheEntry) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| SearchError::Cache(format!("create {}: {e}", dir.display())))?;

    let disk = DiskEntry {
        key: entry.key.clone(),
        fetched_at: entry.fetched_at,
        last_validated_at: entry.last_validated_at(),
        value: (*entry.value).clone(),
    };
    let json = serde_json::to_vec_pretty(&disk)
        .map_err(|e| SearchError::Cache(format!("serialize entry: {e}")))?;

    let path = entry_path(dir, &entry.key);
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &json)
        .await
        .map_err(|e| SearchError::Cache(format!("write {}: {e}", tmp.display())))?;
    if let Err(e) = tokio::fs::rename(&tmp, &path).await {
        remove_file(&tmp).await;
        return Err(SearchError::Cache(format!("rename {}: {e}", path.display())));
    }
    Ok(())
}

async fn remove_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!(path = %path.display(), "cache file removal failed: {e}");
        }
    }
}

fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}
