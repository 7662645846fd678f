//! # Gateway Configuration
//!
//! Configuration management for the log query gateway, including:
//! - Configuration schema and validation
//! - Loading from YAML/TOML/JSON, layered and deep-merged
//! - Environment variable substitution and overrides
//! - Conversion into the runtime types of the other gateway crates

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod loader;
pub mod schema;

// Re-export main types
pub use loader::{load_config, ConfigError, ConfigLoader, ConfigSource};
pub use schema::{
    CacheConfig, DispatcherConfig, GatewayConfig, LimiterConfig, LocalCacheConfig,
    RemoteCacheConfig, RetryConfig,
};
