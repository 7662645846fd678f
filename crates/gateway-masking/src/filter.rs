//! Record-level predicates gating masking rules.
//!
//! A [`FieldFilterSet`] combines [`FieldFilter`]s with AND, OR or NOT. A rule
//! carrying a filter set is applied to a record only when the set matches the
//! record as a whole.

use crate::config::{FieldFilterConfig, FieldFiltersConfig};
use crate::error::MaskError;
use crate::Record;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// How a filter set combines its filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCondition {
    /// Every filter matches; true when there are none
    And,
    /// At least one filter matches; false when there are none
    Or,
    /// The single filter does not match
    Not,
}

impl FromStr for FilterCondition {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            "not" => Ok(Self::Not),
            _ => Err(MaskError::InvalidCondition {
                condition: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FilterCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
            Self::Not => write!(f, "not"),
        }
    }
}

/// How a filter compares a field value with its configured values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Exact equality
    Equal,
    /// Substring
    Contains,
    /// Leading substring
    Prefix,
    /// Trailing substring
    Suffix,
}

impl FromStr for FilterMode {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "equal" => Ok(Self::Equal),
            "contains" => Ok(Self::Contains),
            "prefix" => Ok(Self::Prefix),
            "suffix" => Ok(Self::Suffix),
            _ => Err(MaskError::InvalidFilterMode {
                mode: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "equal"),
            Self::Contains => write!(f, "contains"),
            Self::Prefix => write!(f, "prefix"),
            Self::Suffix => write!(f, "suffix"),
        }
    }
}

/// Predicate over one field of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    field: String,
    mode: FilterMode,
    values: Vec<String>,
}

impl FieldFilter {
    /// Create a filter
    ///
    /// # Errors
    /// Returns an error if `field` is empty or `values` is empty
    pub fn new(
        field: impl Into<String>,
        mode: FilterMode,
        values: Vec<String>,
    ) -> Result<Self, MaskError> {
        let field = field.into();
        if field.is_empty() {
            return Err(MaskError::EmptyFilterField);
        }
        if values.is_empty() {
            return Err(MaskError::EmptyFilterValues { field });
        }
        Ok(Self {
            field,
            mode,
            values,
        })
    }

    /// Compile a configured filter
    ///
    /// # Errors
    /// Returns an error if the mode is unknown or the filter is incomplete
    pub fn compile(config: &FieldFilterConfig) -> Result<Self, MaskError> {
        let mode = config.mode.parse()?;
        Self::new(config.field.clone(), mode, config.values.clone())
    }

    /// Filtered field
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Match mode
    #[must_use]
    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    /// Whether the record's value for the field satisfies this filter.
    /// A record without the field never matches.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        let Some(raw) = record.get(&self.field) else {
            return false;
        };
        let candidate = unquote(raw);
        let candidate = candidate.as_ref();

        self.values.iter().any(|value| match self.mode {
            FilterMode::Equal => candidate == value,
            FilterMode::Contains => candidate.contains(value.as_str()),
            FilterMode::Prefix => candidate.starts_with(value.as_str()),
            FilterMode::Suffix => candidate.ends_with(value.as_str()),
        })
    }
}

/// Strip one level of quoting from values stored as JSON or backtick strings
fn unquote(raw: &str) -> Cow<'_, str> {
    if raw.len() < 2 {
        return Cow::Borrowed(raw);
    }
    if raw.starts_with('"') && raw.ends_with('"') {
        return match serde_json::from_str::<String>(raw) {
            Ok(unquoted) => Cow::Owned(unquoted),
            Err(_) => Cow::Borrowed(raw),
        };
    }
    if raw.starts_with('`') && raw.ends_with('`') {
        let inner = &raw[1..raw.len() - 1];
        if !inner.contains('`') {
            return Cow::Borrowed(inner);
        }
    }
    Cow::Borrowed(raw)
}

/// Boolean combination of field filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilterSet {
    condition: FilterCondition,
    filters: Vec<FieldFilter>,
}

impl FieldFilterSet {
    /// Create a filter set
    ///
    /// # Errors
    /// Returns `MaskError::NotArity` if `condition` is `Not` and there is not
    /// exactly one filter
    pub fn new(condition: FilterCondition, filters: Vec<FieldFilter>) -> Result<Self, MaskError> {
        if condition == FilterCondition::Not && filters.len() != 1 {
            return Err(MaskError::NotArity {
                count: filters.len(),
            });
        }
        Ok(Self { condition, filters })
    }

    /// Compile a configured filter set
    ///
    /// # Errors
    /// Returns an error if the condition or any filter is invalid
    pub fn compile(config: &FieldFiltersConfig) -> Result<Self, MaskError> {
        let condition = config.condition.parse()?;
        let filters = config
            .filters
            .iter()
            .map(FieldFilter::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(condition, filters)
    }

    /// Combination condition
    #[must_use]
    pub fn condition(&self) -> FilterCondition {
        self.condition
    }

    /// The filters
    #[must_use]
    pub fn filters(&self) -> &[FieldFilter] {
        &self.filters
    }

    /// Evaluate the set against a whole record
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self.condition {
            FilterCondition::And => self.filters.iter().all(|f| f.matches(record)),
            FilterCondition::Or => self.filters.iter().any(|f| f.matches(record)),
            FilterCondition::Not => !self.filters.iter().any(|f| f.matches(record)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn filter(field: &str, mode: FilterMode, values: &[&str]) -> FieldFilter {
        FieldFilter::new(field, mode, values.iter().map(|v| (*v).to_string()).collect())
            .expect("valid filter")
    }

    #[test]
    fn test_filter_modes() {
        let rec = record(&[("service", "payments-api")]);

        assert!(filter("service", FilterMode::Equal, &["payments-api"]).matches(&rec));
        assert!(!filter("service", FilterMode::Equal, &["payments"]).matches(&rec));
        assert!(filter("service", FilterMode::Contains, &["ments-a"]).matches(&rec));
        assert!(filter("service", FilterMode::Prefix, &["auth", "pay"]).matches(&rec));
        assert!(filter("service", FilterMode::Suffix, &["-api"]).matches(&rec));
        assert!(!filter("service", FilterMode::Suffix, &["payments-api-v2"]).matches(&rec));
    }

    #[test]
    fn test_absent_field_never_matches() {
        let rec = record(&[("level", "error")]);
        assert!(!filter("service", FilterMode::Equal, &["api"]).matches(&rec));
        assert!(!filter("service", FilterMode::Contains, &[""]).matches(&rec));
    }

    #[test]
    fn test_quoted_values_are_unquoted() {
        let rec = record(&[("service", "\"api\""), ("host", "`web-1`")]);
        assert!(filter("service", FilterMode::Equal, &["api"]).matches(&rec));
        assert!(filter("host", FilterMode::Prefix, &["web"]).matches(&rec));
    }

    #[test]
    fn test_and_requires_all() {
        let set = FieldFilterSet::new(
            FilterCondition::And,
            vec![
                filter("service", FilterMode::Equal, &["api"]),
                filter("level", FilterMode::Equal, &["error"]),
            ],
        )
        .expect("set");

        assert!(set.matches(&record(&[("service", "api"), ("level", "error")])));
        assert!(!set.matches(&record(&[("service", "api"), ("level", "info")])));
        assert!(!set.matches(&record(&[("service", "api")])));
    }

    #[test]
    fn test_or_requires_any() {
        let set = FieldFilterSet::new(
            FilterCondition::Or,
            vec![
                filter("service", FilterMode::Equal, &["api"]),
                filter("level", FilterMode::Equal, &["error"]),
            ],
        )
        .expect("set");

        assert!(set.matches(&record(&[("level", "error")])));
        assert!(!set.matches(&record(&[("level", "info")])));
    }

    #[test]
    fn test_empty_sets() {
        let rec = record(&[("service", "api")]);
        let and = FieldFilterSet::new(FilterCondition::And, Vec::new()).expect("and");
        let or = FieldFilterSet::new(FilterCondition::Or, Vec::new()).expect("or");
        assert!(and.matches(&rec));
        assert!(!or.matches(&rec));
    }

    #[test]
    fn test_not_inverts() {
        let set = FieldFilterSet::new(
            FilterCondition::Not,
            vec![filter("service", FilterMode::Equal, &["api"])],
        )
        .expect("set");

        assert!(!set.matches(&record(&[("service", "api")])));
        assert!(set.matches(&record(&[("service", "worker")])));
        assert!(set.matches(&record(&[])));
    }

    #[test]
    fn test_not_requires_exactly_one_filter() {
        assert!(matches!(
            FieldFilterSet::new(FilterCondition::Not, Vec::new()),
            Err(MaskError::NotArity { count: 0 })
        ));
    }

    #[test]
    fn test_compile_validation() {
        let bad_condition = FieldFiltersConfig {
            condition: "xor".to_string(),
            filters: Vec::new(),
        };
        assert!(matches!(
            FieldFilterSet::compile(&bad_condition),
            Err(MaskError::InvalidCondition { .. })
        ));

        let bad_mode = FieldFilterConfig {
            field: "service".to_string(),
            mode: "regex".to_string(),
            values: vec!["api".to_string()],
        };
        assert!(matches!(
            FieldFilter::compile(&bad_mode),
            Err(MaskError::InvalidFilterMode { .. })
        ));

        let no_field = FieldFilterConfig {
            field: String::new(),
            mode: "equal".to_string(),
            values: vec!["api".to_string()],
        };
        assert!(matches!(
            FieldFilter::compile(&no_field),
            Err(MaskError::EmptyFilterField)
        ));

        let no_values = FieldFilterConfig {
            field: "service".to_string(),
            mode: "equal".to_string(),
            values: Vec::new(),
        };
        assert!(matches!(
            FieldFilter::compile(&no_values),
            Err(MaskError::EmptyFilterValues { .. })
        ));
    }

    #[test]
    fn test_condition_is_case_insensitive() {
        assert_eq!("AND".parse::<FilterCondition>().expect("and"), FilterCondition::And);
        assert_eq!("Not".parse::<FilterCondition>().expect("not"), FilterCondition::Not);
    }
}
