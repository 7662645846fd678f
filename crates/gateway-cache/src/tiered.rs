//! Two-tier cache: a fast local tier in front of a shared remote tier.
//!
//! Reads go local first and fall back to the remote tier, copying remote hits
//! into the local tier. Writes go to the remote tier first on a best-effort
//! basis; the local write decides the outcome. A remote outage therefore only
//! costs cache hit rate, never a failed request.

use crate::{Cache, CacheError, CacheResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cache composed of a local (L1) and a remote (L2) tier
#[derive(Clone)]
pub struct TieredCache {
    local: Arc<dyn Cache>,
    remote: Arc<dyn Cache>,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache").finish_non_exhaustive()
    }
}

impl TieredCache {
    /// Compose two already constructed tiers
    #[must_use]
    pub fn new(local: Arc<dyn Cache>, remote: Arc<dyn Cache>) -> Self {
        Self { local, remote }
    }

    /// The local tier
    #[must_use]
    pub fn local(&self) -> &Arc<dyn Cache> {
        &self.local
    }

    /// The remote tier
    #[must_use]
    pub fn remote(&self) -> &Arc<dyn Cache> {
        &self.remote
    }

    /// Copy a remote hit into the local tier. Failures are not surfaced.
    async fn backfill(&self, key: &str, value: &str) {
        let ttl = match self.remote.get_ttl(key).await {
            Ok(ttl) => ttl,
            Err(err) => {
                debug!(key, error = %err, "Skipping local backfill, remote ttl unknown");
                return;
            }
        };
        if let Err(err) = self.local.set_with_ttl(key, value, ttl).await {
            debug!(key, error = %err, "Local backfill failed");
        }
    }
}

#[async_trait]
impl Cache for TieredCache {
    async fn get(&self, key: &str) -> CacheResult<String> {
        match self.local.get(key).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_not_found() => {}
            Err(err) => debug!(key, error = %err, "Local cache tier failed, trying remote"),
        }

        match self.remote.get(key).await {
            Ok(value) => {
                self.backfill(key, &value).await;
                Ok(value)
            }
            Err(CacheError::NotFound) => Err(CacheError::NotFound),
            Err(err) => {
                warn!(key, error = %err, "Remote cache tier unavailable, treating as miss");
                Err(CacheError::NotFound)
            }
        }
    }

    async fn get_ttl(&self, key: &str) -> CacheResult<Duration> {
        match self.local.get_ttl(key).await {
            Ok(ttl) => return Ok(ttl),
            Err(err) if err.is_not_found() => {}
            Err(err) => debug!(key, error = %err, "Local cache tier failed, trying remote"),
        }

        match self.remote.get_ttl(key).await {
            Ok(ttl) => Ok(ttl),
            Err(CacheError::NotFound) => Err(CacheError::NotFound),
            Err(err) => {
                warn!(key, error = %err, "Remote cache tier unavailable, treating as miss");
                Err(CacheError::NotFound)
            }
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        if let Err(err) = self.remote.set_with_ttl(key, value, ttl).await {
            warn!(key, error = %err, "Remote cache write failed");
        }
        self.local.set_with_ttl(key, value, ttl).await
    }

    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        // each tier applies its own default TTL
        if let Err(err) = self.remote.set(key, value).await {
            warn!(key, error = %err, "Remote cache write failed");
        }
        self.local.set(key, value).await
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        if let Err(err) = self.remote.del(key).await {
            warn!(key, error = %err, "Remote cache delete failed");
        }
        self.local.del(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCache, MemoryCacheConfig};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Remote tier double with an outage switch and a read counter
    #[derive(Default)]
    struct FakeRemote {
        inner: MemoryCache,
        down: AtomicBool,
        reads: AtomicUsize,
    }

    impl FakeRemote {
        fn outage(&self) -> CacheResult<()> {
            if self.down.load(Ordering::SeqCst) {
                Err(CacheError::backend("connection refused"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Cache for FakeRemote {
        async fn get(&self, key: &str) -> CacheResult<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.outage()?;
            self.inner.get(key).await
        }

        async fn get_ttl(&self, key: &str) -> CacheResult<Duration> {
            self.outage()?;
            self.inner.get_ttl(key).await
        }

        async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
            self.outage()?;
            self.inner.set_with_ttl(key, value, ttl).await
        }

        async fn del(&self, key: &str) -> CacheResult<()> {
            self.outage()?;
            self.inner.del(key).await
        }
    }

    fn tiered() -> (TieredCache, Arc<MemoryCache>, Arc<FakeRemote>) {
        let local = Arc::new(MemoryCache::with_defaults());
        let remote = Arc::new(FakeRemote::default());
        let cache = TieredCache::new(local.clone(), remote.clone());
        (cache, local, remote)
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (cache, local, remote) = tiered();

        cache
            .set_with_ttl("k", "v", Duration::from_secs(60))
            .await
            .expect("set");

        assert_eq!(cache.get("k").await, Ok("v".to_string()));
        assert!(local.get("k").await.is_ok());
        assert!(remote.inner.get("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_set_succeeds_with_remote_down() {
        let (cache, _local, remote) = tiered();
        remote.down.store(true, Ordering::SeqCst);

        cache
            .set_with_ttl("k", "v", Duration::from_secs(60))
            .await
            .expect("local write decides success");

        assert_eq!(cache.get("k").await, Ok("v".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_set_uses_local_default_ttl() {
        let local = Arc::new(MemoryCache::new(MemoryCacheConfig {
            default_ttl: Duration::from_secs(5),
            ..Default::default()
        }));
        let remote = Arc::new(FakeRemote::default());
        let cache = TieredCache::new(local.clone(), remote.clone());

        cache.set("k", "v").await.expect("set");
        assert_eq!(local.get_ttl("k").await, Ok(Duration::from_secs(5)));
        assert_eq!(remote.inner.get_ttl("k").await, Ok(Duration::ZERO));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(local.get("k").await, Err(CacheError::NotFound));
    }

    #[tokio::test]
    async fn test_local_hit_skips_remote() {
        let (cache, _local, remote) = tiered();

        cache.set("k", "v").await.expect("set");
        let _ = cache.get("k").await;

        assert_eq!(remote.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_hit_backfills_local_with_remaining_ttl() {
        let (cache, local, remote) = tiered();
        remote
            .inner
            .set_with_ttl("k", "v", Duration::from_secs(30))
            .await
            .expect("seed remote");
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(cache.get("k").await, Ok("v".to_string()));
        assert_eq!(remote.reads.load(Ordering::SeqCst), 1);

        assert_eq!(local.get_ttl("k").await, Ok(Duration::from_secs(20)));

        // served locally now
        assert_eq!(cache.get("k").await, Ok("v".to_string()));
        assert_eq!(remote.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_miss() {
        let (cache, _local, _remote) = tiered();
        assert_eq!(cache.get("missing").await, Err(CacheError::NotFound));
    }

    #[tokio::test]
    async fn test_remote_error_is_treated_as_miss() {
        let (cache, _local, remote) = tiered();
        remote.down.store(true, Ordering::SeqCst);

        assert_eq!(cache.get("k").await, Err(CacheError::NotFound));
        assert_eq!(cache.get_ttl("k").await, Err(CacheError::NotFound));
    }

    #[tokio::test]
    async fn test_local_survives_remote_outage() {
        let (cache, _local, remote) = tiered();

        cache.set("k", "v").await.expect("set");
        remote.down.store(true, Ordering::SeqCst);

        assert_eq!(cache.get("k").await, Ok("v".to_string()));
    }

    #[tokio::test]
    async fn test_del_removes_from_both_tiers() {
        let (cache, local, remote) = tiered();

        cache.set("k", "v").await.expect("set");
        cache.del("k").await.expect("del");

        assert!(local.get("k").await.is_err());
        assert!(remote.inner.get("k").await.is_err());
        cache.del("k").await.expect("idempotent");
    }

    #[tokio::test]
    async fn test_del_with_remote_down_still_clears_local() {
        let (cache, local, remote) = tiered();

        cache.set("k", "v").await.expect("set");
        remote.down.store(true, Ordering::SeqCst);

        cache.del("k").await.expect("del");
        assert!(local.get("k").await.is_err());
    }
}
