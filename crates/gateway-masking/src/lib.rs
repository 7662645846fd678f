//! # Gateway Masking
//!
//! Redaction of sensitive data before responses leave the gateway:
//! - [`MaskingConfig`], the declarative rule set as read from configuration
//! - [`Mask`], one compiled rule (regex, capture groups, rewrite mode)
//! - [`FieldScope`] and [`FieldFilterSet`], deciding which fields and which
//!   records a rule touches
//! - [`Masker`], applying the ordered rule list to records and to
//!   aggregation bucket keys
//!
//! All validation happens when rules are compiled at startup. Applying
//! compiled rules cannot fail.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod filter;
pub mod mask;
pub mod masker;
pub mod scope;

// Re-export main types
pub use config::{FieldFilterConfig, FieldFiltersConfig, MaskConfig, MaskingConfig};
pub use error::MaskError;
pub use filter::{FieldFilter, FieldFilterSet, FilterCondition, FilterMode};
pub use mask::{Mask, MaskMode};
pub use masker::Masker;
pub use scope::FieldScope;

/// A log record as seen by the masker: field name to rendered value
pub type Record = std::collections::HashMap<String, String>;
