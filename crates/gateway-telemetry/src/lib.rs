//! # Gateway Telemetry
//!
//! Structured logging for the log query gateway, built on `tracing` and
//! `tracing-subscriber`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;

pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError, SpanEvents};
