//! Coordinator configuration
//!
//! Defaults → YAML → environment, validated before use.
//!
//! ```rust,ignore
//! use drivesync_core::config::CoordinatorConfig;
//!
//! let config = CoordinatorConfig::from_yaml_str("change_limit: 500")?
//!     .with_env_overrides()?;
//! config.validate()?;
//! ```

pub mod constants;
pub mod coordinator_config;
pub mod error;

pub use coordinator_config::{CacheConfig, CoordinatorConfig, CHANGE_LIMIT_ENV};
pub use error::{ConfigError, ConfigResult};
