//! # Gateway Cache
//!
//! Response caching for the log query gateway:
//! - A uniform async [`Cache`] contract shared by every tier
//! - [`MemoryCache`], the in-process tier
//! - [`RedisCache`], the distributed tier shared between gateway instances
//! - [`TieredCache`], composing both with read-through backfill and
//!   best-effort write-through
//!
//! A missing key is reported as [`CacheError::NotFound`], which callers treat
//! as a normal outcome rather than a failure.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod json;
pub mod keys;
pub mod memory;
pub mod remote;
pub mod tiered;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

// Re-export main types
pub use json::CacheJsonExt;
pub use memory::{CacheStats, MemoryCache, MemoryCacheConfig};
pub use remote::{RedisCache, RedisCacheConfig};
pub use tiered::TieredCache;

/// Result type alias using `CacheError`
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache operation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The key is not cached
    #[error("key not found")]
    NotFound,

    /// The backing store failed
    #[error("cache backend error: {message}")]
    Backend {
        /// Error message
        message: String,
    },

    /// The backing store did not answer in time
    #[error("cache operation timed out after {duration:?}")]
    Timeout {
        /// Configured command timeout
        duration: Duration,
    },

    /// A typed value could not be encoded or decoded
    #[error("cache value serialization failed: {message}")]
    Serialization {
        /// Error message
        message: String,
    },
}

impl CacheError {
    /// Create a backend error
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Whether this is a plain miss
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Uniform contract implemented by every cache tier.
///
/// A TTL of [`Duration::ZERO`] means the entry never expires, both when
/// storing and when reported by [`Cache::get_ttl`].
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch the value stored under `key`
    ///
    /// # Errors
    /// `CacheError::NotFound` when absent, other variants on backend failure
    async fn get(&self, key: &str) -> CacheResult<String>;

    /// Remaining lifetime of `key`
    ///
    /// # Errors
    /// `CacheError::NotFound` when absent, other variants on backend failure
    async fn get_ttl(&self, key: &str) -> CacheResult<Duration>;

    /// Store `value` under `key` for `ttl`, replacing any previous value
    ///
    /// # Errors
    /// Returns an error if the backend rejects the write
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Store `value` under `key` without expiry
    ///
    /// # Errors
    /// Returns an error if the backend rejects the write
    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        self.set_with_ttl(key, value, Duration::ZERO).await
    }

    /// Remove `key`; removing a missing key succeeds
    ///
    /// # Errors
    /// Returns an error if the backend rejects the delete
    async fn del(&self, key: &str) -> CacheResult<()>;
}
