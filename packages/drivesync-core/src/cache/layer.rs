//! Cache layer fronting the root registry and the collection membership index

use prometheus::Registry;

use super::user_cache::UserCache;
use crate::config::CoordinatorConfig;
use crate::domain::{RootRefs, RootSets};
use crate::Result;

/// Both projection caches, invalidated together on root mutations
pub struct CacheLayer {
    pub roots: UserCache<RootSets>,
    pub collection_members: UserCache<RootRefs>,
}

impl CacheLayer {
    pub fn new(config: &CoordinatorConfig, registry: &Registry) -> Result<Self> {
        Ok(Self {
            roots: UserCache::new("sync_root_cache", &config.root_cache, registry)?,
            collection_members: UserCache::new(
                "collection_member_cache",
                &config.collection_member_cache,
                registry,
            )?,
        })
    }

    pub async fn invalidate_roots(&self, user: &str) {
        tracing::debug!("Invalidating synchronization root cache for user: {}", user);
        self.roots.invalidate(user).await;
    }

    pub async fn invalidate_collection_members(&self, user: &str) {
        tracing::debug!(
            "Invalidating collection sync root member cache for user: {}",
            user
        );
        self.collection_members.invalidate(user).await;
    }

    pub fn invalidate_all_collection_members(&self) {
        tracing::debug!("Invalidating collection sync root member cache for all users");
        self.collection_members.invalidate_all();
    }

    /// Both caches, one user
    pub async fn invalidate_user(&self, user: &str) {
        self.invalidate_roots(user).await;
        self.invalidate_collection_members(user).await;
    }

    /// Both caches, every user
    pub fn clear(&self) {
        tracing::debug!(
            "Invalidating synchronization root cache and collection sync root member cache for all users"
        );
        self.roots.invalidate_all();
        self.collection_members.invalidate_all();
    }
}
