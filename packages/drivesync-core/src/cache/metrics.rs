//! Prometheus metrics for user-keyed caches

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
    Opts, Registry,
};

/// Counters of one user-keyed cache, names prefixed by the cache name
#[derive(Clone)]
pub struct UserCacheMetrics {
    pub hits: IntCounter,
    pub misses: IntCounter,
    pub invalidations: IntCounter,
    pub stale_writes_skipped: IntCounter,
    pub entries: IntGauge,
}

impl UserCacheMetrics {
    pub fn new(prefix: &str, registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            hits: register_int_counter_with_registry!(
                Opts::new(format!("{}_hits_total", prefix), "Cache hits"),
                registry
            )?,
            misses: register_int_counter_with_registry!(
                Opts::new(format!("{}_misses_total", prefix), "Cache misses"),
                registry
            )?,
            invalidations: register_int_counter_with_registry!(
                Opts::new(
                    format!("{}_invalidations_total", prefix),
                    "Explicit invalidations (single user or all)"
                ),
                registry
            )?,
            stale_writes_skipped: register_int_counter_with_registry!(
                Opts::new(
                    format!("{}_stale_writes_skipped_total", prefix),
                    "Recomputed values dropped because an invalidation raced them"
                ),
                registry
            )?,
            entries: register_int_gauge_with_registry!(
                Opts::new(format!("{}_entries", prefix), "Cached users"),
                registry
            )?,
        })
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.get() as f64;
        let total = hits + self.misses.get() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}
