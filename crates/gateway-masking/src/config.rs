//! Declarative masking rules as they appear in configuration.
//!
//! These types only describe rules. Nothing is validated here; compiling them
//! into a [`Masker`](crate::Masker) performs every check.

use serde::{Deserialize, Serialize};

/// Full masking configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskingConfig {
    /// Rules, applied in order
    pub masks: Vec<MaskConfig>,
    /// Global "process only these fields" list, used by rules without a scope
    pub process_fields: Vec<String>,
    /// Global "process all except these fields" list, used by rules without a scope
    pub ignore_fields: Vec<String>,
}

/// A single masking rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskConfig {
    /// Regular expression selecting the sensitive text
    pub re: String,
    /// Capture groups to rewrite; empty means the whole match
    #[serde(default)]
    pub groups: Vec<usize>,
    /// One of `mask`, `replace` or `cut`
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Replacement text for `replace` mode
    #[serde(default)]
    pub replace_word: String,
    /// Only these fields are rewritten
    #[serde(default)]
    pub process_fields: Vec<String>,
    /// Every field except these is rewritten
    #[serde(default)]
    pub ignore_fields: Vec<String>,
    /// Record-level predicate gating the rule
    #[serde(default)]
    pub field_filters: Option<FieldFiltersConfig>,
}

fn default_mode() -> String {
    "mask".to_string()
}

impl MaskConfig {
    /// Rule masking every match of `re` in every field
    #[must_use]
    pub fn new(re: impl Into<String>) -> Self {
        Self {
            re: re.into(),
            groups: Vec::new(),
            mode: default_mode(),
            replace_word: String::new(),
            process_fields: Vec::new(),
            ignore_fields: Vec::new(),
            field_filters: None,
        }
    }
}

/// Boolean combination of field predicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFiltersConfig {
    /// One of `and`, `or` or `not`
    pub condition: String,
    /// The predicates
    #[serde(default)]
    pub filters: Vec<FieldFilterConfig>,
}

/// Predicate over a single record field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilterConfig {
    /// Field name
    pub field: String,
    /// One of `equal`, `contains`, `prefix` or `suffix`
    pub mode: String,
    /// Accepted values; any one may match
    #[serde(default)]
    pub values: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_rules() {
        let yaml = r#"
process_fields: [message]
masks:
  - re: '(\d{3})-(\d{3})-(\d{4})'
    groups: [1, 3]
  - re: 'token=\w+'
    mode: replace
    replace_word: "token=<hidden>"
    field_filters:
      condition: and
      filters:
        - { field: service, mode: equal, values: [api] }
"#;
        let config: MaskingConfig = serde_yaml::from_str(yaml).expect("parse");

        assert_eq!(config.process_fields, vec!["message"]);
        assert!(config.ignore_fields.is_empty());
        assert_eq!(config.masks.len(), 2);
        assert_eq!(config.masks[0].mode, "mask");
        assert_eq!(config.masks[0].groups, vec![1, 3]);

        let filters = config.masks[1].field_filters.as_ref().expect("filters");
        assert_eq!(filters.condition, "and");
        assert_eq!(filters.filters[0].values, vec!["api"]);
    }

    #[test]
    fn test_empty_config() {
        let config: MaskingConfig = serde_yaml::from_str("{}").expect("parse");
        assert_eq!(config, MaskingConfig::default());
    }
}
