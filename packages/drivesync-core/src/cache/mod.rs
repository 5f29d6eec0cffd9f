//! User-keyed projection caches
//!
//! - **Root cache**: `user → RootSets`
//! - **Collection member cache**: `user → RootRefs`
//!
//! Both are moka caches (bounded, expire after write). Reads are
//! cache-through without single-flight; writes invalidate explicitly.

mod layer;
mod metrics;
mod user_cache;

pub use layer::CacheLayer;
pub use metrics::UserCacheMetrics;
pub use user_cache::{Generation, UserCache};
