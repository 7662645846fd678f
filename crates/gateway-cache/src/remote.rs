//! Redis-backed cache tier.
//!
//! Shares cached values across gateway instances. Every command is bounded by
//! the configured timeout so a slow or unreachable Redis degrades into an
//! error instead of stalling the request. TTLs are stored with millisecond
//! precision (`PSETEX` / `PTTL`).

use crate::{Cache, CacheError, CacheResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, IntoConnectionInfo, RedisResult};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for the Redis tier.
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`
    pub url: String,
    /// Password, overriding any password in the URL
    pub password: Option<SecretString>,
    /// Prefix prepended to every key
    pub key_prefix: String,
    /// Upper bound for connecting and for each command
    pub timeout: Duration,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/".to_string(),
            password: None,
            key_prefix: "logq:".to_string(),
            timeout: Duration::from_millis(500),
        }
    }
}

/// Distributed cache tier backed by Redis
pub struct RedisCache {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connect to Redis
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the connection cannot be
    /// established within the configured timeout
    pub async fn connect(config: RedisCacheConfig) -> CacheResult<Self> {
        let mut info = config
            .url
            .as_str()
            .into_connection_info()
            .map_err(|e| CacheError::backend(format!("invalid redis url: {e}")))?;
        if let Some(password) = &config.password {
            info.redis.password = Some(password.expose_secret().clone());
        }

        let client = Client::open(info).map_err(|e| CacheError::backend(e.to_string()))?;
        let connection = bounded(config.timeout, ConnectionManager::new(client)).await?;

        info!(prefix = %config.key_prefix, "Connected to redis cache tier");
        Ok(Self { connection, config })
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &RedisCacheConfig {
        &self.config
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }
}

/// Run a redis future under `timeout`, flattening both failure kinds
async fn bounded<T, F>(timeout: Duration, future: F) -> CacheResult<T>
where
    F: Future<Output = RedisResult<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(CacheError::backend(err.to_string())),
        Err(_) => Err(CacheError::Timeout { duration: timeout }),
    }
}

/// Interpret a `PTTL` reply: -2 missing, -1 no expiry, otherwise milliseconds
fn ttl_from_pttl(reply: i64) -> CacheResult<Duration> {
    match reply {
        -2 => Err(CacheError::NotFound),
        -1 => Ok(Duration::ZERO),
        ms if ms >= 0 => Ok(Duration::from_millis(ms.unsigned_abs())),
        other => Err(CacheError::backend(format!("unexpected PTTL reply {other}"))),
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<String> {
        let mut conn = self.connection.clone();
        let value: Option<String> = bounded(self.config.timeout, conn.get(self.key(key))).await?;
        value.ok_or(CacheError::NotFound)
    }

    async fn get_ttl(&self, key: &str) -> CacheResult<Duration> {
        let mut conn = self.connection.clone();
        let reply: i64 = bounded(self.config.timeout, conn.pttl(self.key(key))).await?;
        ttl_from_pttl(reply)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let key = self.key(key);
        if ttl.is_zero() {
            bounded::<(), _>(self.config.timeout, conn.set(key, value)).await
        } else {
            // sub-millisecond TTLs would be rejected by PSETEX
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            debug!(ttl_ms = millis, "Writing redis cache entry");
            bounded::<(), _>(self.config.timeout, conn.pset_ex(key, value, millis)).await
        }
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        bounded::<(), _>(self.config.timeout, conn.del(self.key(key))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pttl_interpretation() {
        assert_eq!(ttl_from_pttl(-2), Err(CacheError::NotFound));
        assert_eq!(ttl_from_pttl(-1), Ok(Duration::ZERO));
        assert_eq!(ttl_from_pttl(1500), Ok(Duration::from_millis(1500)));
        assert!(matches!(ttl_from_pttl(-7), Err(CacheError::Backend { .. })));
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let config = RedisCacheConfig {
            password: Some(SecretString::new("hunter2".to_string())),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let config = RedisCacheConfig {
            url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            RedisCache::connect(config).await,
            Err(CacheError::Backend { .. })
        ));
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: CacheResult<()> = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(CacheError::Timeout { .. })));
    }
}
