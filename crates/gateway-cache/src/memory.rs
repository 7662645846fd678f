//! In-process cache tier.
//!
//! Entries live in a bounded map. When the map is full, expired entries are
//! dropped first and then the least-hit entries, so hot keys survive.

use crate::{Cache, CacheError, CacheResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// In-process tier configuration
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries; zero means unbounded
    pub max_entries: usize,
    /// TTL used by [`Cache::set`]; zero means no expiry
    pub default_ttl: Duration,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10000,
            default_ttl: Duration::ZERO,
        }
    }
}

/// A cached value
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The cached value
    value: String,
    /// When the entry was stored
    inserted_at: Instant,
    /// TTL for this entry, zero for none
    ttl: Duration,
    /// Number of times this entry has been read
    hits: u64,
}

impl CacheEntry {
    fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
            hits: 0,
        }
    }

    fn is_expired(&self) -> bool {
        !self.ttl.is_zero() && self.inserted_at.elapsed() >= self.ttl
    }

    fn remaining_ttl(&self) -> Duration {
        if self.ttl.is_zero() {
            Duration::ZERO
        } else {
            self.ttl.saturating_sub(self.inserted_at.elapsed())
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Current number of entries
    pub entries: usize,
    /// Number of evictions
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate hit rate
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

/// In-process cache tier
#[derive(Debug, Default)]
pub struct MemoryCache {
    /// Cache configuration
    config: MemoryCacheConfig,
    /// The cache entries
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// Cache statistics
    stats: RwLock<CacheStats>,
}

impl MemoryCache {
    /// Create a new in-process cache
    #[must_use]
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(MemoryCacheConfig::default())
    }

    /// Number of stored entries, expired ones included until swept
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Evict expired entries, then the least-hit ones, until there is room
    /// for one more entry
    fn evict(&self, entries: &mut HashMap<String, CacheEntry>, stats: &mut CacheStats) {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        let removed_expired = before - entries.len();

        if entries.len() >= self.config.max_entries {
            let to_remove = entries.len() - self.config.max_entries + 1;

            let mut hit_counts: Vec<(String, u64)> = entries
                .iter()
                .map(|(k, v)| (k.clone(), v.hits))
                .collect();
            hit_counts.sort_by_key(|(_, hits)| *hits);

            for (key, _) in hit_counts.into_iter().take(to_remove) {
                entries.remove(&key);
            }
        }

        let removed = before - entries.len();
        stats.evictions += removed as u64;

        if removed > 0 {
            info!(
                removed_expired,
                removed_total = removed,
                "Cache eviction completed"
            );
        }
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        let mut stats = self.stats.write();

        entries.clear();
        stats.entries = 0;

        info!("Cache cleared");
    }

    /// Remove expired entries
    pub fn cleanup_expired(&self) {
        let mut entries = self.entries.write();
        let mut stats = self.stats.write();

        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        let removed = before - entries.len();

        stats.entries = entries.len();
        stats.evictions += removed as u64;

        if removed > 0 {
            debug!(removed, "Expired cache entries removed");
        }
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<String> {
        let mut entries = self.entries.write();
        let mut stats = self.stats.write();

        match entries.get_mut(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                stats.misses += 1;
                stats.entries = entries.len();
                debug!(key, "Cache miss (expired)");
                Err(CacheError::NotFound)
            }
            Some(entry) => {
                entry.hits += 1;
                stats.hits += 1;
                Ok(entry.value.clone())
            }
            None => {
                stats.misses += 1;
                Err(CacheError::NotFound)
            }
        }
    }

    async fn get_ttl(&self, key: &str) -> CacheResult<Duration> {
        match self.entries.read().get(key) {
            Some(entry) if !entry.is_expired() => Ok(entry.remaining_ttl()),
            _ => Err(CacheError::NotFound),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut entries = self.entries.write();
        let mut stats = self.stats.write();

        if self.config.max_entries > 0
            && !entries.contains_key(key)
            && entries.len() >= self.config.max_entries
        {
            self.evict(&mut entries, &mut stats);
        }

        entries.insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        stats.entries = entries.len();
        Ok(())
    }

    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        self.set_with_ttl(key, value, self.config.default_ttl).await
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        let mut entries = self.entries.write();
        entries.remove(key);
        self.stats.write().entries = entries.len();
        Ok(())
    }
}
