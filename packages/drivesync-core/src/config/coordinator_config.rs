//! Coordinator configuration model

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use super::error::{ConfigError, ConfigResult};

/// Environment variable overriding [`CoordinatorConfig::change_limit`]
pub const CHANGE_LIMIT_ENV: &str = "DRIVESYNC_DOCUMENT_CHANGE_LIMIT";

/// Sizing of one user-keyed cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of users held
    pub max_capacity: u64,

    /// Seconds an entry lives after being written
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    fn validate(&self, prefix: &str) -> ConfigResult<()> {
        if self.max_capacity == 0 {
            return Err(ConfigError::Range {
                field: format!("{}.max_capacity", prefix),
                value: self.max_capacity.to_string(),
                min: "1".to_string(),
                max: u64::MAX.to_string(),
                hint: "A cache must hold at least one user".to_string(),
            });
        }
        if self.ttl_secs == 0 {
            return Err(ConfigError::Range {
                field: format!("{}.ttl_secs", prefix),
                value: self.ttl_secs.to_string(),
                min: "1".to_string(),
                max: u64::MAX.to_string(),
                hint: "Use a short TTL instead of disabling expiry".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: constants::cache::DEFAULT_MAX_CAPACITY,
            ttl_secs: constants::cache::DEFAULT_TTL_SECS,
        }
    }
}

/// Synchronization coordinator configuration
///
/// # Examples
///
/// ```rust
/// use drivesync_core::config::CoordinatorConfig;
///
/// let config = CoordinatorConfig::from_yaml_str("change_limit: 250").unwrap();
/// assert_eq!(config.change_limit, 250);
/// assert_eq!(config.collection_page_size, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Maximum change records requested per repository and call
    pub change_limit: usize,

    /// Page size used when walking collection members
    pub collection_page_size: usize,

    /// Synchronization root cache
    pub root_cache: CacheConfig,

    /// Collection member cache
    pub collection_member_cache: CacheConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            change_limit: constants::DEFAULT_CHANGE_LIMIT,
            collection_page_size: constants::COLLECTION_CONTENT_PAGE_SIZE,
            root_cache: CacheConfig::default(),
            collection_member_cache: CacheConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Parse from a YAML document; missing fields keep their defaults
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> ConfigResult<Self> {
        self.with_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides_from<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(CHANGE_LIMIT_ENV) {
            self.change_limit = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Env {
                    var: CHANGE_LIMIT_ENV.to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(self)
    }

    /// Range checks
    pub fn validate(&self) -> ConfigResult<()> {
        if self.change_limit == 0 {
            return Err(ConfigError::Range {
                field: "change_limit".to_string(),
                value: "0".to_string(),
                min: "1".to_string(),
                max: usize::MAX.to_string(),
                hint: format!("Default is {}", constants::DEFAULT_CHANGE_LIMIT),
            });
        }
        if self.collection_page_size == 0 {
            return Err(ConfigError::Range {
                field: "collection_page_size".to_string(),
                value: "0".to_string(),
                min: "1".to_string(),
                max: usize::MAX.to_string(),
                hint: format!("Default is {}", constants::COLLECTION_CONTENT_PAGE_SIZE),
            });
        }
        self.root_cache.validate("root_cache")?;
        self.collection_member_cache
            .validate("collection_member_cache")?;
        Ok(())
    }
}
