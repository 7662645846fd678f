//! Per-key admission control with bounded token pools.
//!
//! Each key (typically a user) owns a pool of `max_tokens` interchangeable
//! tokens. Taking a token never blocks: an empty pool is reported back to the
//! caller, who is expected to reject or defer the request. Pools are created
//! lazily and start full.

use gateway_core::{GatewayError, GatewayResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Token pool for a single key
#[derive(Debug)]
struct TokenPool {
    available: AtomicUsize,
    capacity: usize,
}

impl TokenPool {
    fn full(capacity: usize) -> Self {
        Self {
            available: AtomicUsize::new(capacity),
            capacity,
        }
    }

    /// Take one token if any is left
    fn try_take(&self) -> bool {
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Return one token unless the pool is already full
    fn put_back(&self) -> bool {
        let capacity = self.capacity;
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .is_ok()
    }

    fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }
}

/// Bounded concurrency limiter keyed by an arbitrary string.
///
/// The key map sits behind one mutex that is only held to look up or create a
/// pool; token traffic itself is a lock-free update on the pool.
///
/// Pools are never removed: the map holds one small pool for every key seen
/// over the limiter's lifetime, so keys should come from a bounded set such
/// as user ids.
#[derive(Debug)]
pub struct TokenLimiter {
    /// Identifier used in logs
    id: String,
    /// Tokens per key
    max_tokens: usize,
    /// Per-key pools
    pools: Mutex<HashMap<String, Arc<TokenPool>>>,
}

impl TokenLimiter {
    /// Create a limiter granting up to `max_tokens` concurrent tokens per key
    #[must_use]
    pub fn new(id: impl Into<String>, max_tokens: usize) -> Self {
        Self {
            id: id.into(),
            max_tokens,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Get the limiter ID
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tokens each key starts with
    #[must_use]
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn pool(&self, key: &str) -> Arc<TokenPool> {
        let mut pools = self.pools.lock();
        if let Some(pool) = pools.get(key) {
            return Arc::clone(pool);
        }
        let pool = Arc::new(TokenPool::full(self.max_tokens));
        pools.insert(key.to_string(), Arc::clone(&pool));
        pool
    }

    /// Try to take a token for `key`.
    ///
    /// Returns `false` when a token was taken and the caller may proceed, and
    /// `true` when the key is out of tokens.
    pub fn limited(&self, key: &str) -> bool {
        let limited = !self.pool(key).try_take();
        if limited {
            debug!(
                limiter = %self.id,
                key = %key,
                max_tokens = self.max_tokens,
                "Token pool exhausted"
            );
        }
        limited
    }

    /// Give a token back to `key`'s pool. Extra releases are ignored.
    pub fn fill(&self, key: &str) {
        if !self.pool(key).put_back() {
            trace!(limiter = %self.id, key = %key, "Token pool already full");
        }
    }

    /// Take a token that is returned automatically when the guard drops
    #[must_use]
    pub fn try_acquire(&self, key: &str) -> Option<TokenGuard> {
        let pool = self.pool(key);
        if pool.try_take() {
            Some(TokenGuard {
                pool,
                key: key.to_string(),
            })
        } else {
            debug!(limiter = %self.id, key = %key, "Token pool exhausted");
            None
        }
    }

    /// Like [`TokenLimiter::try_acquire`], reporting exhaustion as an error
    ///
    /// # Errors
    /// Returns `GatewayError::TooManyRequests` when the key has no tokens left
    pub fn acquire(&self, key: &str) -> GatewayResult<TokenGuard> {
        self.try_acquire(key)
            .ok_or_else(|| GatewayError::too_many_requests(key))
    }

    /// Tokens currently available for `key`; unseen keys report a full pool
    #[must_use]
    pub fn available(&self, key: &str) -> usize {
        self.pools
            .lock()
            .get(key)
            .map_or(self.max_tokens, |pool| pool.available())
    }

    /// Number of keys with a pool
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.pools.lock().len()
    }
}

/// A token held for the lifetime of the guard
#[derive(Debug)]
pub struct TokenGuard {
    pool: Arc<TokenPool>,
    key: String,
}

impl TokenGuard {
    /// Key the token was taken from
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for TokenGuard {
    fn drop(&mut self) {
        self.pool.put_back();
    }
}
