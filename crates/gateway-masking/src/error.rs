//! Rule compilation errors

use thiserror::Error;

/// Errors raised while compiling masking rules
#[derive(Debug, Error)]
pub enum MaskError {
    /// The pattern is not a valid regular expression
    #[error("invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        /// Offending pattern
        pattern: String,
        /// Parser error
        #[source]
        source: regex::Error,
    },

    /// Unknown rewrite mode
    #[error("unknown mask mode {mode:?}, expected mask, replace or cut")]
    InvalidMode {
        /// Offending mode
        mode: String,
    },

    /// `replace` mode without a replacement
    #[error("replace mode requires a non-empty replace_word")]
    EmptyReplaceWord,

    /// Capture group index beyond the pattern's groups
    #[error("capture group {group} out of range, pattern has {max} groups")]
    GroupOutOfRange {
        /// Offending index
        group: usize,
        /// Highest valid index
        max: usize,
    },

    /// Capture group listed twice
    #[error("capture group {group} listed more than once")]
    DuplicateGroup {
        /// Offending index
        group: usize,
    },

    /// Both a process and an ignore list on the same scope
    #[error("process_fields and ignore_fields are mutually exclusive")]
    ConflictingScope,

    /// Unknown filter set condition
    #[error("unknown filter condition {condition:?}, expected and, or or not")]
    InvalidCondition {
        /// Offending condition
        condition: String,
    },

    /// `not` condition without exactly one filter
    #[error("not condition requires exactly one filter, got {count}")]
    NotArity {
        /// Number of configured filters
        count: usize,
    },

    /// Filter without a field name
    #[error("field filter requires a field name")]
    EmptyFilterField,

    /// Filter without values
    #[error("field filter on {field:?} requires at least one value")]
    EmptyFilterValues {
        /// Filtered field
        field: String,
    },

    /// Unknown filter match mode
    #[error("unknown filter mode {mode:?}, expected equal, contains, prefix or suffix")]
    InvalidFilterMode {
        /// Offending mode
        mode: String,
    },

    /// A rule in a list failed to compile
    #[error("mask #{index}: {source}")]
    Rule {
        /// Position of the rule in the configured list
        index: usize,
        /// Underlying failure
        #[source]
        source: Box<MaskError>,
    },
}

impl MaskError {
    /// Attach the rule position to this error
    #[must_use]
    pub fn in_rule(self, index: usize) -> Self {
        Self::Rule {
            index,
            source: Box::new(self),
        }
    }
}
