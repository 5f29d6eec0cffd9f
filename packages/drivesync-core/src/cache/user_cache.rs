//! Bounded, write-expiring cache keyed by user

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::future::Cache;
use moka::notification::RemovalCause;
use prometheus::Registry;

use super::metrics::UserCacheMetrics;
use crate::config::CacheConfig;
use crate::Result;

/// Invalidation stamp observed before a recomputation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    epoch: u64,
    user: u64,
}

/// Per-user invalidation stamps, bounded like the cache they guard
///
/// Stamps come from one counter shared by every user, so a fresh stamp is
/// larger than any value observed before it was issued. A stamp that leaves
/// the table raises `floor`, which then stands in for every unstamped user:
/// an evicted stamp can only read back as a larger value, never as one a
/// caller already observed.
struct Stamps {
    table: moka::sync::Cache<String, u64>,
    counter: AtomicU64,
    floor: Arc<AtomicU64>,
}

impl Stamps {
    fn new(config: &CacheConfig) -> Self {
        let floor = Arc::new(AtomicU64::new(0));
        let evicted = Arc::clone(&floor);
        let table = moka::sync::Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl())
            .eviction_listener(move |_user: Arc<String>, stamp: u64, _cause: RemovalCause| {
                evicted.fetch_max(stamp, Ordering::SeqCst);
            })
            .build();
        Self {
            table,
            counter: AtomicU64::new(0),
            floor,
        }
    }

    fn get(&self, user: &str) -> u64 {
        self.table
            .get(user)
            .unwrap_or_else(|| self.floor.load(Ordering::SeqCst))
    }

    fn bump(&self, user: &str) {
        let stamp = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.table.insert(user.to_string(), stamp);
    }

    fn clear(&self) {
        self.table.invalidate_all();
        self.table.run_pending_tasks();
    }
}

/// User-keyed cache with explicit invalidation
///
/// A value recomputed while an invalidation for the same user (or a global
/// one) happened is never left in the cache.
pub struct UserCache<V: Send + Sync + 'static> {
    name: &'static str,
    cache: Cache<String, Arc<V>>,
    stamps: Stamps,
    epoch: AtomicU64,
    metrics: UserCacheMetrics,
}

impl<V: Send + Sync + 'static> UserCache<V> {
    pub fn new(name: &'static str, config: &CacheConfig, registry: &Registry) -> Result<Self> {
        let cache = Cache::builder()
            .name(name)
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl())
            .build();

        Ok(Self {
            name,
            cache,
            stamps: Stamps::new(config),
            epoch: AtomicU64::new(0),
            metrics: UserCacheMetrics::new(name, registry)?,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn get(&self, user: &str) -> Option<Arc<V>> {
        let result = self.cache.get(user).await;
        if result.is_some() {
            self.metrics.hits.inc();
        } else {
            self.metrics.misses.inc();
        }
        result
    }

    pub fn generation(&self, user: &str) -> Generation {
        Generation {
            epoch: self.epoch.load(Ordering::SeqCst),
            user: self.stamps.get(user),
        }
    }

    /// Store `value` unless `user` was invalidated since `observed`
    ///
    /// Returns whether the value is cached.
    pub async fn insert_if_current(&self, user: &str, value: Arc<V>, observed: Generation) -> bool {
        if self.generation(user) != observed {
            self.metrics.stale_writes_skipped.inc();
            return false;
        }
        self.cache.insert(user.to_string(), value).await;
        // An invalidation may have slipped in between the check and the insert
        if self.generation(user) != observed {
            self.cache.invalidate(user).await;
            self.metrics.stale_writes_skipped.inc();
            return false;
        }
        self.metrics.entries.set(self.cache.entry_count() as i64);
        true
    }

    /// Cache-through read; concurrent misses each recompute
    pub async fn get_or_try_compute<F, Fut>(&self, user: &str, compute: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(user).await {
            return Ok(value);
        }
        tracing::debug!("{} miss for user: {}", self.name, user);
        let observed = self.generation(user);
        let value = Arc::new(compute().await?);
        self.insert_if_current(user, Arc::clone(&value), observed)
            .await;
        Ok(value)
    }

    pub async fn invalidate(&self, user: &str) {
        self.stamps.bump(user);
        self.cache.invalidate(user).await;
        self.metrics.invalidations.inc();
        self.metrics.entries.set(self.cache.entry_count() as i64);
    }

    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.stamps.clear();
        self.cache.invalidate_all();
        self.metrics.invalidations.inc();
        self.metrics.entries.set(0);
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Users currently holding an invalidation stamp
    pub fn stamp_count(&self) -> u64 {
        self.stamps.table.run_pending_tasks();
        self.stamps.table.entry_count()
    }

    pub fn metrics(&self) -> &UserCacheMetrics {
        &self.metrics
    }
}
