//! Field scoping for masking rules.

use crate::error::MaskError;
use std::collections::HashSet;

/// Which fields of a record a rule rewrites
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldScope {
    /// Only the listed fields
    Process(HashSet<String>),
    /// Every field except the listed ones, including fields unknown up front
    Ignore(HashSet<String>),
}

impl FieldScope {
    /// Build a scope from a process list and an ignore list.
    ///
    /// Returns `None` when both lists are empty.
    ///
    /// # Errors
    /// Returns `MaskError::ConflictingScope` if both lists are set
    pub fn from_lists(process: &[String], ignore: &[String]) -> Result<Option<Self>, MaskError> {
        match (process.is_empty(), ignore.is_empty()) {
            (true, true) => Ok(None),
            (false, true) => Ok(Some(Self::Process(process.iter().cloned().collect()))),
            (true, false) => Ok(Some(Self::Ignore(ignore.iter().cloned().collect()))),
            (false, false) => Err(MaskError::ConflictingScope),
        }
    }

    /// Whether `field` falls inside this scope
    #[must_use]
    pub fn allows(&self, field: &str) -> bool {
        match self {
            Self::Process(fields) => fields.contains(field),
            Self::Ignore(fields) => !fields.contains(field),
        }
    }
}
