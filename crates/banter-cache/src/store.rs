//! File-backed response cache keyed by a hash of the request parameters.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use banter_core::error::{BanterError, Result};

use crate::clock::{Clock, SystemClock};

const RECORD_EXTENSION: &str = "json";

/// The parameter set a cached value is addressed by.
///
/// Backed by a sorted map, so insertion order never affects the key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheParams(BTreeMap<String, String>);

impl CacheParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Hex-encoded SHA-256 of the sorted parameters.
    pub fn key(&self) -> String {
        // A BTreeMap always serializes in key order.
        let canonical = serde_json::to_string(&self.0).unwrap_or_default();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// On-disk record. The parameters are kept for debugging only.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheRecord {
    value: String,
    created_at: DateTime<Utc>,
    ttl_ms: u64,
    params: CacheParams,
}

impl CacheRecord {
    /// A record created in the future (clock skew) is not expired.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match now.signed_duration_since(self.created_at).to_std() {
            Ok(age) => age > Duration::from_millis(self.ttl_ms),
            Err(_) => false,
        }
    }
}

/// TTLs past `u64::MAX` milliseconds saturate, which is effectively forever.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// Summary returned by [`ResponseCache::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    /// Records that could not be read or parsed.
    pub corrupt_entries: usize,
    pub total_bytes: u64,
}

/// File-backed TTL cache.
///
/// There is no cross-process locking: two writers of the same key race and
/// the last write wins.
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
    enabled: bool,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    /// Open a cache rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration, enabled: bool) -> Result<Self> {
        Self::with_clock(dir, ttl, enabled, Arc::new(SystemClock))
    }

    /// Open a cache that reads time from `clock`.
    pub fn with_clock(
        dir: impl Into<PathBuf>,
        ttl: Duration,
        enabled: bool,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let dir = dir.into();
        if enabled {
            std::fs::create_dir_all(&dir).map_err(|e| {
                BanterError::Cache(format!(
                    "Failed to create cache dir {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            info!(dir = %dir.display(), ttl_ms = ttl_millis(ttl), "Response cache ready");
        }
        Ok(Self {
            dir,
            ttl,
            enabled,
            clock,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, RECORD_EXTENSION))
    }

    /// Look up a value. Expired records are deleted on the way out.
    ///
    /// Unreadable or corrupt records count as a miss.
    pub fn get(&self, params: &CacheParams) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let key = params.key();
        let path = self.record_path(&key);
        let record = match read_record(&path) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Unreadable cache record, treating as miss");
                return None;
            }
        };

        if record.is_expired(self.clock.now()) {
            debug!(key = %key, "Cache entry expired");
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(key = %key, error = %e, "Failed to delete expired cache record");
            }
            return None;
        }

        debug!(key = %key, "Cache hit");
        Some(record.value)
    }

    /// Store a value, overwriting any previous entry for the same key.
    pub fn set(&self, params: &CacheParams, value: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let key = params.key();
        let record = CacheRecord {
            value: value.to_string(),
            created_at: self.clock.now(),
            ttl_ms: ttl_millis(self.ttl),
            params: params.clone(),
        };
        let content = serde_json::to_string_pretty(&record)?;
        std::fs::write(self.record_path(&key), content).map_err(|e| {
            BanterError::Cache(format!("Failed to write cache record {}: {}", key, e))
        })?;
        debug!(key = %key, "Cache entry stored");
        Ok(())
    }

    /// Delete every expired or corrupt record. Returns the number removed.
    pub fn clear_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut removed = 0;
        for path in self.record_paths()? {
            let stale = match read_record(&path) {
                Ok(Some(record)) => record.is_expired(now),
                Ok(None) => false,
                Err(_) => true,
            };
            if stale && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        info!(removed, "Expired cache entries cleared");
        Ok(removed)
    }

    /// Delete every record. Returns the number removed.
    pub fn clear_all(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.record_paths()? {
            if std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        info!(removed, "Cache cleared");
        Ok(removed)
    }

    /// Count records by state and total their size on disk.
    pub fn stats(&self) -> Result<CacheStats> {
        let now = self.clock.now();
        let mut stats = CacheStats::default();
        for path in self.record_paths()? {
            stats.total_entries += 1;
            stats.total_bytes += std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            match read_record(&path) {
                Ok(Some(record)) if record.is_expired(now) => stats.expired_entries += 1,
                Ok(Some(_)) => stats.valid_entries += 1,
                Ok(None) => stats.total_entries -= 1,
                Err(_) => stats.corrupt_entries += 1,
            }
        }
        Ok(stats)
    }

    fn record_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(BanterError::Cache(format!(
                    "Failed to list cache dir {}: {}",
                    self.dir.display(),
                    e
                )))
            }
        };

        Ok(entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == RECORD_EXTENSION))
            .collect())
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("dir", &self.dir)
            .field("ttl", &self.ttl)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// `Ok(None)` when the record does not exist.
fn read_record(path: &Path) -> Result<Option<CacheRecord>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&content)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn setup(ttl_secs: u64) -> (tempfile::TempDir, Arc<ManualClock>, ResponseCache) {
        setup_with_ttl(Duration::from_secs(ttl_secs))
    }

    fn setup_with_ttl(ttl: Duration) -> (tempfile::TempDir, Arc<ManualClock>, ResponseCache) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache =
            ResponseCache::with_clock(dir.path().join("cache"), ttl, true, clock.clone()).unwrap();
        (dir, clock, cache)
    }

    fn params() -> CacheParams {
        CacheParams::new()
            .with("persona", "Tactician")
            .with("context", "Clutch 1v3")
            .with("mode", "text")
            .with("language", "en")
    }

    #[test]
    fn test_key_is_order_independent() {
        let a = CacheParams::new().with("k1", "a").with("k2", "b");
        let b = CacheParams::new().with("k2", "b").with("k1", "a");
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().len(), 64);
    }

    #[test]
    fn test_key_differs_by_value() {
        let a = CacheParams::new().with("mode", "text");
        let b = CacheParams::new().with("mode", "voice");
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_set_then_get_with_reordered_params() {
        let (_dir, _clock, cache) = setup(60);
        let set_params = CacheParams::new().with("k1", "a").with("k2", "b");
        cache.set(&set_params, "value").unwrap();

        let get_params = CacheParams::new().with("k2", "b").with("k1", "a");
        assert_eq!(cache.get(&get_params).as_deref(), Some("value"));
    }

    #[test]
    fn test_miss_on_unknown_key() {
        let (_dir, _clock, cache) = setup(60);
        assert!(cache.get(&params()).is_none());
    }

    #[test]
    fn test_set_overwrites() {
        let (_dir, _clock, cache) = setup(60);
        cache.set(&params(), "first").unwrap();
        cache.set(&params(), "second").unwrap();
        assert_eq!(cache.get(&params()).as_deref(), Some("second"));
        assert_eq!(cache.stats().unwrap().total_entries, 1);
    }

    #[test]
    fn test_ttl_boundary() {
        let (_dir, clock, cache) = setup(10);
        cache.set(&params(), "X").unwrap();

        clock.advance(chrono::Duration::seconds(5));
        assert_eq!(cache.get(&params()).as_deref(), Some("X"));

        // Exactly at the TTL the entry is still valid.
        clock.advance(chrono::Duration::seconds(5));
        assert_eq!(cache.get(&params()).as_deref(), Some("X"));

        clock.advance(chrono::Duration::seconds(5));
        assert!(cache.get(&params()).is_none());
    }

    #[test]
    fn test_expired_record_is_deleted_on_read() {
        let (_dir, clock, cache) = setup(10);
        cache.set(&params(), "X").unwrap();
        let path = cache.record_path(&params().key());
        assert!(path.exists());

        clock.advance(chrono::Duration::seconds(11));
        assert!(cache.get(&params()).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_record_carries_params() {
        let (_dir, _clock, cache) = setup(10);
        cache.set(&params(), "X").unwrap();
        let raw = std::fs::read_to_string(cache.record_path(&params().key())).unwrap();
        let record: CacheRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.ttl_ms, 10_000);
        assert_eq!(record.params.get("persona"), Some("Tactician"));
    }

    #[test]
    fn test_corrupt_record_is_a_miss() {
        let (_dir, _clock, cache) = setup(10);
        std::fs::write(cache.record_path(&params().key()), "{ not json").unwrap();
        assert!(cache.get(&params()).is_none());
        assert_eq!(cache.stats().unwrap().corrupt_entries, 1);
    }

    #[test]
    fn test_disabled_cache_never_stores() {
        let dir = tempfile::tempdir().unwrap();
        let cache =
            ResponseCache::new(dir.path().join("off"), Duration::from_secs(60), false).unwrap();
        cache.set(&params(), "X").unwrap();
        assert!(cache.get(&params()).is_none());
        assert!(!dir.path().join("off").exists());
    }

    #[test]
    fn test_clear_expired_and_stats() {
        let (_dir, clock, cache) = setup(10);
        cache.set(&CacheParams::new().with("n", "1"), "old").unwrap();
        clock.advance(chrono::Duration::seconds(8));
        cache.set(&CacheParams::new().with("n", "2"), "new").unwrap();
        clock.advance(chrono::Duration::seconds(5));

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.valid_entries, 1);
        assert!(stats.total_bytes > 0);

        assert_eq!(cache.clear_expired().unwrap(), 1);
        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.expired_entries, 0);
    }

    #[test]
    fn test_clear_all() {
        let (_dir, _clock, cache) = setup(10);
        for n in 0..3 {
            cache
                .set(&CacheParams::new().with("n", n.to_string()), "v")
                .unwrap();
        }
        // Unrelated files are left alone.
        std::fs::write(cache.dir().join("notes.txt"), "keep").unwrap();

        assert_eq!(cache.clear_all().unwrap(), 3);
        assert_eq!(cache.stats().unwrap(), CacheStats::default());
        assert!(cache.dir().join("notes.txt").exists());
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        for ttl in [
            Duration::from_secs(100_000_000_000_000_000),
            Duration::from_secs(u64::MAX),
        ] {
            let (_dir, clock, cache) = setup_with_ttl(ttl);
            cache.set(&params(), "X").unwrap();
            assert_eq!(cache.get(&params()).as_deref(), Some("X"));

            clock.advance(chrono::Duration::days(365 * 100));
            assert_eq!(cache.get(&params()).as_deref(), Some("X"));
            assert_eq!(cache.stats().unwrap().expired_entries, 0);
        }
    }

    #[test]
    fn test_sub_second_ttl() {
        let (_dir, clock, cache) = setup_with_ttl(Duration::from_millis(900));
        cache.set(&params(), "X").unwrap();

        clock.advance(chrono::Duration::milliseconds(500));
        assert_eq!(cache.get(&params()).as_deref(), Some("X"));

        clock.advance(chrono::Duration::milliseconds(500));
        assert!(cache.get(&params()).is_none());
    }

    #[test]
    fn test_record_from_the_future_is_not_expired() {
        let (_dir, clock, cache) = setup(10);
        cache.set(&params(), "X").unwrap();
        clock.advance(chrono::Duration::seconds(-30));
        assert_eq!(cache.get(&params()).as_deref(), Some("X"));
    }
}
