//! Response cache for comparison results.
//!
//! [`TtlStore`] is the shared storage primitive: a capacity-bounded LRU map
//! whose entries expire a fixed TTL after insertion. [`ResponseCache`] stores
//! `(CompareResult, Metadata)` pairs keyed by request fingerprint; the
//! idempotency cache reuses the same store.

use crate::error::CacheError;
use crate::types::{CompareResult, Metadata};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Aggregate cache performance counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Compute the hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

/// Capacity-bounded TTL map with least-recently-used eviction.
///
/// Callers may rely on the capacity bound and on expired entries never being
/// returned, not on a particular eviction order.
pub struct TtlStore<V> {
    entries: Mutex<LruCache<String, Entry<V>>>,
    capacity: NonZeroUsize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> std::fmt::Debug for TtlStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlStore")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

impl<V> TtlStore<V> {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    async fn lock(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MutexGuard<'_, LruCache<String, Entry<V>>>, CacheError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CacheError::Cancelled),
            guard = self.entries.lock() => Ok(guard),
        }
    }

    /// Fetch a live entry. Expired entries are dropped and count as misses.
    pub async fn get(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<V>>, CacheError> {
        let mut entries = self.lock(cancel).await?;
        let now = Instant::now();

        let expired = match entries.peek(key) {
            Some(entry) => entry.expires_at <= now,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
        };
        if expired {
            entries.pop(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(entries.get(key).map(|entry| Arc::clone(&entry.value)))
    }

    /// Insert or replace an entry (last write wins).
    pub async fn insert(
        &self,
        key: String,
        value: V,
        cancel: &CancellationToken,
    ) -> Result<(), CacheError> {
        let mut entries = self.lock(cancel).await?;
        let now = Instant::now();
        make_room(&mut entries, &key, now);
        entries.put(
            key,
            Entry {
                value: Arc::new(value),
                expires_at: now + self.ttl,
            },
        );
        Ok(())
    }

    /// Insert only when no live entry exists under `key`.
    ///
    /// Returns `false` and leaves the stored entry untouched otherwise.
    pub async fn insert_if_vacant(
        &self,
        key: String,
        value: V,
        cancel: &CancellationToken,
    ) -> Result<bool, CacheError> {
        let mut entries = self.lock(cancel).await?;
        let now = Instant::now();
        if entries
            .peek(&key)
            .is_some_and(|entry| entry.expires_at > now)
        {
            return Ok(false);
        }
        make_room(&mut entries, &key, now);
        entries.put(
            key,
            Entry {
                value: Arc::new(value),
                expires_at: now + self.ttl,
            },
        );
        Ok(true)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        purge(&mut entries, Instant::now())
    }

    /// Number of stored entries, including ones that expired but were not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len().await,
            capacity: self.capacity(),
        }
    }
}

/// Before inserting a new key into a full cache, reclaim expired entries so
/// that live entries are only evicted when nothing has expired.
fn make_room<V>(entries: &mut LruCache<String, Entry<V>>, key: &str, now: Instant) {
    if entries.len() >= entries.cap().get() && !entries.contains(key) {
        purge(entries, now);
    }
}

fn purge<V>(entries: &mut LruCache<String, Entry<V>>, now: Instant) -> usize {
    let expired: Vec<String> = entries
        .iter()
        .filter(|(_, entry)| entry.expires_at <= now)
        .map(|(key, _)| key.clone())
        .collect();
    for key in &expired {
        entries.pop(key);
    }
    expired.len()
}

/// A cached comparison outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedComparison {
    pub result: CompareResult,
    pub metadata: Metadata,
}

/// Read-through/write-through cache of comparison results keyed by
/// request fingerprint.
#[derive(Debug)]
pub struct ResponseCache {
    store: TtlStore<CachedComparison>,
}

impl ResponseCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        debug!(max_entries, ttl_secs = ttl.as_secs(), "response cache initialized");
        Self {
            store: TtlStore::new(max_entries, ttl),
        }
    }

    pub async fn get(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<CachedComparison>>, CacheError> {
        let hit = self.store.get(key, cancel).await?;
        debug!(cache_key = key, hit = hit.is_some(), "response cache lookup");
        Ok(hit)
    }

    pub async fn set(
        &self,
        key: &str,
        value: CachedComparison,
        cancel: &CancellationToken,
    ) -> Result<(), CacheError> {
        self.store.insert(key.to_string(), value, cancel).await?;
        debug!(cache_key = key, ttl_secs = self.store.ttl().as_secs(), "response cache set");
        Ok(())
    }

    pub async fn purge_expired(&self) -> usize {
        self.store.purge_expired().await
    }

    pub async fn len(&self) -> usize {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.store.is_empty().await
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.stats().await
    }
}
