//! # Gateway Core
//!
//! Shared building blocks for the log query gateway:
//! - Error taxonomy used by the dispatcher and admission control
//! - Backend error codes returned by replica stubs
//! - Request context carrying cancellation and deadlines

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod context;
pub mod error;

// Re-export main types
pub use context::{ContextError, RequestContext};
pub use error::{BackendCode, BackendError, GatewayError, GatewayResult};
