//! Versioned TTL cache over a [`KeyValueStore`].
//!
//! Every value is stored as a JSON record:
//!
//! ```json
//! { "value": ..., "timestamp": 1718000000000, "version": "1.0.0", "expiry": 1800000 }
//! ```
//!
//! A record is valid only while its `version` matches the expected schema
//! version and `now - timestamp <= expiry` (no `expiry` means no time limit).
//! Invalid and unreadable records are deleted by the read that finds them;
//! nothing sweeps the store in the background.

pub mod keys;

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::KeyValueStore;

// =============================================================================
// Clock
// =============================================================================

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Start the clock at `now_millis`.
    #[must_use]
    pub const fn new(now_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(now_millis),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(duration_millis(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Whole milliseconds in `d`, saturating at `i64::MAX`.
#[must_use]
pub fn duration_millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

// =============================================================================
// Entries
// =============================================================================

/// A stored cache record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    /// Write time, epoch milliseconds.
    pub timestamp: i64,
    /// Schema version the value was written under.
    pub version: String,
    /// Time-to-live in milliseconds; `None` never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
}

impl<T> CacheEntry<T> {
    /// Whether the entry may be served at `now` to a reader expecting `version`.
    #[must_use]
    pub fn is_valid(&self, expected_version: &str, now: i64) -> bool {
        self.version == expected_version
            && self
                .expiry
                .is_none_or(|ttl| now.saturating_sub(self.timestamp) <= ttl)
    }
}

// =============================================================================
// VersionedCache
// =============================================================================

/// Prefixed, versioned, time-boxed cache shared by every service.
///
/// Cheap to clone; clones share the same store and clock.
#[derive(Clone)]
pub struct VersionedCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    prefix: String,
    version: String,
}

impl VersionedCache {
    /// Create a cache writing `prefix`-ed keys stamped with `version`.
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        prefix: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                store,
                clock,
                prefix: prefix.into(),
                version: version.into(),
            }),
        }
    }

    /// The schema version new entries are written with.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.inner.version
    }

    /// Current time according to the cache's clock.
    #[must_use]
    pub fn now_millis(&self) -> i64 {
        self.inner.clock.now_millis()
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.inner.prefix)
    }

    /// Store `value` under the current schema version.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let version = self.inner.version.clone();
        self.set_versioned(key, value, ttl, &version);
    }

    /// Store `value` under an explicit schema version.
    ///
    /// Write failures are logged, never returned: losing a cache write only
    /// costs a later network round-trip.
    pub fn set_versioned<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        version: &str,
    ) {
        let entry = CacheEntry {
            value,
            timestamp: self.now_millis(),
            version: version.to_string(),
            expiry: ttl.map(duration_millis),
        };

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        if let Err(e) = self.inner.store.set(&self.full_key(key), raw) {
            tracing::warn!(key, error = %e, "Failed to write cache entry");
        }
    }

    /// Read a value written under the current schema version.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_versioned(key, &self.inner.version)
    }

    /// Read a value, expecting `expected_version`.
    ///
    /// Returns `None` and deletes the record when it is missing, expired,
    /// written under another version, or unreadable as `T`.
    #[must_use]
    pub fn get_versioned<T: DeserializeOwned>(&self, key: &str, expected_version: &str) -> Option<T> {
        let full_key = self.full_key(key);
        let raw = self.inner.store.get(&full_key)?;

        let entry = match serde_json::from_str::<CacheEntry<Value>>(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key, error = %e, "Dropping corrupt cache entry");
                self.evict(&full_key);
                return None;
            }
        };

        if !entry.is_valid(expected_version, self.now_millis()) {
            tracing::debug!(key, version = %entry.version, "Evicting stale cache entry");
            self.evict(&full_key);
            return None;
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Dropping cache entry with unexpected shape");
                self.evict(&full_key);
                None
            }
        }
    }

    /// Whether a valid entry exists for `key`, evicting it if stale.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get::<Value>(key).is_some()
    }

    /// Delete `key` unconditionally.
    pub fn remove(&self, key: &str) {
        self.evict(&self.full_key(key));
    }

    /// Delete every key starting with `prefix`.
    ///
    /// Linear in the total number of stored keys.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let full_prefix = self.full_key(prefix);
        let doomed: Vec<String> = self
            .inner
            .store
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(&full_prefix))
            .collect();
        for key in &doomed {
            self.evict(key);
        }
        doomed.len()
    }

    /// Delete every key in this cache's namespace.
    pub fn clear(&self) -> usize {
        self.remove_prefix("")
    }

    fn evict(&self, full_key: &str) {
        if let Err(e) = self.inner.store.remove(full_key) {
            tracing::warn!(key = full_key, error = %e, "Failed to delete cache entry");
        }
    }
}
