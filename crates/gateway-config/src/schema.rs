//! Configuration schema definitions.
//!
//! Every section has defaults, so an empty document is a valid
//! configuration. Durations are written in humantime form (`250ms`, `2s`).

use gateway_cache::{MemoryCacheConfig, RedisCacheConfig};
use gateway_masking::{MaskError, Masker, MaskingConfig};
use gateway_resilience::{RetryBudget, TokenLimiter};
use gateway_telemetry::LoggingConfig;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GatewayConfig {
    /// Backend dispatch configuration
    #[validate(nested)]
    pub dispatcher: DispatcherConfig,

    /// Response cache configuration
    #[validate(nested)]
    pub cache: CacheConfig,

    /// Per-key admission limiter configuration
    #[validate(nested)]
    pub limiter: LimiterConfig,

    /// Field masking rules
    pub masking: MaskingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Validate the configuration
    ///
    /// # Errors
    /// Returns validation errors if configuration is invalid
    pub fn validate_config(&self) -> Result<(), validator::ValidationErrors> {
        self.validate()
    }

    /// Retry budget for the dispatcher
    #[must_use]
    pub fn retry_budget(&self) -> RetryBudget {
        self.dispatcher.retry.budget()
    }

    /// Settings for the in-process cache tier
    #[must_use]
    pub fn local_cache_config(&self) -> MemoryCacheConfig {
        MemoryCacheConfig {
            max_entries: self.cache.local.max_entries,
            default_ttl: self.cache.local.default_ttl,
        }
    }

    /// Settings for the Redis tier, if one is configured
    #[must_use]
    pub fn redis_config(&self) -> Option<RedisCacheConfig> {
        self.cache.remote.as_ref().map(|remote| RedisCacheConfig {
            url: remote.url.clone(),
            password: remote.password.clone(),
            key_prefix: remote.key_prefix.clone(),
            timeout: remote.timeout,
        })
    }

    /// Token limiter named `id`
    #[must_use]
    pub fn token_limiter(&self, id: impl Into<String>) -> TokenLimiter {
        TokenLimiter::new(id, self.limiter.max_tokens)
    }

    /// Compile the masking rules
    ///
    /// # Errors
    /// Returns the first rule that fails to compile
    pub fn masker(&self) -> Result<Masker, MaskError> {
        Masker::new(&self.masking)
    }
}

/// Backend dispatch configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Retry policy across full passes over the nodes
    #[validate(nested)]
    pub retry: RetryConfig,
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra passes after the first; negative values mean none
    #[validate(range(max = 100))]
    pub max_retries: i64,

    /// Sleep before the first retry, doubled for each further retry
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Upper bound on a single sleep; zero means unbounded
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let budget = RetryBudget::default();
        Self {
            max_retries: i64::from(budget.max_retries),
            initial_backoff: budget.initial_backoff,
            max_backoff: budget.max_backoff,
        }
    }
}

impl RetryConfig {
    /// Convert into a retry budget
    #[must_use]
    pub fn budget(&self) -> RetryBudget {
        RetryBudget::new(self.max_retries, self.initial_backoff, self.max_backoff)
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheConfig {
    /// In-process tier
    #[validate(nested)]
    pub local: LocalCacheConfig,

    /// Redis tier; absent means local-only caching
    #[validate(nested)]
    pub remote: Option<RemoteCacheConfig>,
}

/// In-process cache tier configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LocalCacheConfig {
    /// Maximum entries; zero means unbounded
    pub max_entries: usize,

    /// TTL for entries stored without one; zero means no expiry
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
}

impl Default for LocalCacheConfig {
    fn default() -> Self {
        let defaults = MemoryCacheConfig::default();
        Self {
            max_entries: defaults.max_entries,
            default_ttl: defaults.default_ttl,
        }
    }
}

/// Redis cache tier configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RemoteCacheConfig {
    /// Connection URL
    #[validate(length(min = 1))]
    pub url: String,

    /// Password; never serialized back out
    #[serde(skip_serializing)]
    pub password: Option<SecretString>,

    /// Prefix prepended to every key
    pub key_prefix: String,

    /// Bound on connecting and on each command
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for RemoteCacheConfig {
    fn default() -> Self {
        let defaults = RedisCacheConfig::default();
        Self {
            url: defaults.url,
            password: defaults.password,
            key_prefix: defaults.key_prefix,
            timeout: defaults.timeout,
        }
    }
}

/// Per-key admission limiter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LimiterConfig {
    /// Concurrent tokens per key
    #[validate(range(min = 1))]
    pub max_tokens: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self { max_tokens: 2 }
    }
}
