//! Typed JSON values on top of any cache tier.

use crate::{Cache, CacheError, CacheResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Store and load `serde` values as JSON strings
#[async_trait]
pub trait CacheJsonExt: Cache {
    /// Load and decode the value under `key`
    ///
    /// # Errors
    /// `CacheError::NotFound` on a miss, `CacheError::Serialization` when the
    /// stored value is not valid JSON for `T`
    async fn get_json<T>(&self, key: &str) -> CacheResult<T>
    where
        T: DeserializeOwned + Send,
    {
        let raw = self.get(key).await?;
        serde_json::from_str(&raw).map_err(|e| CacheError::Serialization {
            message: e.to_string(),
        })
    }

    /// Encode `value` and store it under `key` for `ttl`
    ///
    /// # Errors
    /// `CacheError::Serialization` when `value` cannot be encoded, otherwise
    /// whatever the tier reports
    async fn set_json<T>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let raw = serde_json::to_string(value).map_err(|e| CacheError::Serialization {
            message: e.to_string(),
        })?;
        self.set_with_ttl(key, &raw, ttl).await
    }
}

impl<C: Cache + ?Sized> CacheJsonExt for C {}
