//! # Gateway Resilience
//!
//! Resilience patterns for the log query gateway:
//! - Exponential backoff between retry attempts
//! - Backend dispatcher with random node order, failover and retry
//! - Per-key token limiter for admission control of expensive operations

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
pub mod dispatcher;
pub mod limiter;

// Re-export main types
pub use backoff::{BackoffPolicy, RetryBudget};
pub use dispatcher::Dispatcher;
pub use limiter::{TokenGuard, TokenLimiter};
