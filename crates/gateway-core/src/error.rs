//! Error types and handling for the gateway.
//!
//! Backend stubs report failures as [`BackendError`], classified by a
//! [`BackendCode`]. The dispatcher reduces those to a [`GatewayError`], which is
//! the only error type handler code ever sees from the core. Nothing here knows
//! about HTTP; mapping to status codes belongs to the handler layer.

use crate::context::ContextError;
use std::fmt;
use thiserror::Error;

/// Result type alias using `GatewayError`
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Classification of a failure reported by a backend replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendCode {
    /// Node is down or unreachable; the only code that triggers failover
    Unavailable,
    /// The call was cancelled
    Canceled,
    /// The call ran past its deadline
    DeadlineExceeded,
    /// The request was rejected as malformed
    InvalidArgument,
    /// The requested entity does not exist
    NotFound,
    /// The node is throttling or out of some resource
    ResourceExhausted,
    /// The node failed internally
    Internal,
    /// Anything the transport could not classify
    Unknown,
}

impl BackendCode {
    /// Stable lowercase name of the code
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Canceled => "canceled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::ResourceExhausted => "resource_exhausted",
            Self::Internal => "internal",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BackendCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure returned by a single call to a backend stub.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct BackendError {
    /// Classification of the failure
    pub code: BackendCode,
    /// Transport supplied description
    pub message: String,
}

impl BackendError {
    /// Create a backend error with an explicit code
    #[must_use]
    pub fn new(code: BackendCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create an "unavailable" error
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(BackendCode::Unavailable, message)
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(BackendCode::Internal, message)
    }

    /// Whether the node should be skipped in favour of the next one
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.code == BackendCode::Unavailable
    }
}

/// Gateway error type surfaced to handler code
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The caller cancelled the request
    #[error("Request canceled")]
    Canceled,

    /// The caller's deadline passed
    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    /// A backend node failed with a non-transient error
    #[error("Backend error ({code}): {message}")]
    Backend {
        /// Classification reported by the node
        code: BackendCode,
        /// Error message
        message: String,
    },

    /// Every attempt over every node came back unavailable
    #[error("Internal error: retries exhausted after {attempts} attempts: {cause}")]
    RetriesExhausted {
        /// Number of full node passes performed
        attempts: u32,
        /// Last underlying failure, flattened to text
        cause: String,
    },

    /// Admission control rejected the request
    #[error("Too many concurrent requests for key: {key}")]
    TooManyRequests {
        /// Limiter key that ran out of tokens
        key: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Get the error code for programmatic handling
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Canceled => "canceled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Backend { code, .. } => code.as_str(),
            Self::RetriesExhausted { .. } => "internal_error",
            Self::TooManyRequests { .. } => "too_many_requests",
            Self::Configuration { .. } => "configuration_error",
        }
    }

    /// Whether the error originates from the caller's own context
    #[must_use]
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded)
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an admission control rejection
    #[must_use]
    pub fn too_many_requests(key: impl Into<String>) -> Self {
        Self::TooManyRequests { key: key.into() }
    }

    /// Create a retry-exhausted error from the last cause
    #[must_use]
    pub fn retries_exhausted(attempts: u32, cause: &impl fmt::Display) -> Self {
        Self::RetriesExhausted {
            attempts,
            cause: cause.to_string(),
        }
    }
}

impl From<ContextError> for GatewayError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => Self::Canceled,
            ContextError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

impl From<BackendError> for GatewayError {
    fn from(err: BackendError) -> Self {
        match err.code {
            BackendCode::Canceled => Self::Canceled,
            BackendCode::DeadlineExceeded => Self::DeadlineExceeded,
            code => Self::Backend {
                code,
                message: err.message,
            },
        }
    }
}
