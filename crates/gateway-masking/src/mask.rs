//! A single compiled masking rule.

use crate::config::MaskConfig;
use crate::error::MaskError;
use crate::filter::FieldFilterSet;
use crate::scope::FieldScope;
use crate::Record;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

/// Character written over masked text.
///
/// `mask` mode writes one per `char` of the matched range, not one per byte,
/// so multi-byte text keeps its visible width.
pub const MASK_CHAR: char = '*';

/// How matched text is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskMode {
    /// Overwrite with [`MASK_CHAR`], keeping the length
    Mask,
    /// Substitute the replacement word
    Replace,
    /// Remove
    Cut,
}

impl FromStr for MaskMode {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mask" => Ok(Self::Mask),
            "replace" => Ok(Self::Replace),
            "cut" => Ok(Self::Cut),
            _ => Err(MaskError::InvalidMode {
                mode: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for MaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mask => write!(f, "mask"),
            Self::Replace => write!(f, "replace"),
            Self::Cut => write!(f, "cut"),
        }
    }
}

/// Compiled, immutable masking rule
#[derive(Debug, Clone)]
pub struct Mask {
    pattern: Regex,
    groups: Vec<usize>,
    mode: MaskMode,
    replace_word: String,
    scope: Option<Arc<FieldScope>>,
    filter: Option<FieldFilterSet>,
}

impl Mask {
    /// Compile a configured rule.
    ///
    /// `global_scope` is used when the rule declares no field lists of its own.
    ///
    /// # Errors
    /// Returns an error if the regex, mode, groups, scope or filter set is
    /// invalid
    pub fn compile(
        config: &MaskConfig,
        global_scope: Option<&Arc<FieldScope>>,
    ) -> Result<Self, MaskError> {
        let pattern = Regex::new(&config.re).map_err(|source| MaskError::InvalidRegex {
            pattern: config.re.clone(),
            source,
        })?;

        let mode: MaskMode = config.mode.parse()?;
        if mode == MaskMode::Replace && config.replace_word.is_empty() {
            return Err(MaskError::EmptyReplaceWord);
        }

        let groups = compile_groups(&pattern, &config.groups)?;

        let scope = match FieldScope::from_lists(&config.process_fields, &config.ignore_fields)? {
            Some(own) => Some(Arc::new(own)),
            None => global_scope.cloned(),
        };

        let filter = config
            .field_filters
            .as_ref()
            .map(FieldFilterSet::compile)
            .transpose()?;

        Ok(Self {
            pattern,
            groups,
            mode,
            replace_word: config.replace_word.clone(),
            scope,
            filter,
        })
    }

    /// The compiled pattern
    #[must_use]
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Capture groups rewritten by this rule
    #[must_use]
    pub fn groups(&self) -> &[usize] {
        &self.groups
    }

    /// Rewrite mode
    #[must_use]
    pub fn mode(&self) -> MaskMode {
        self.mode
    }

    /// Effective field scope, `None` meaning every field
    #[must_use]
    pub fn scope(&self) -> Option<&FieldScope> {
        self.scope.as_deref()
    }

    /// Record-level filter set, if any
    #[must_use]
    pub fn filter(&self) -> Option<&FieldFilterSet> {
        self.filter.as_ref()
    }

    /// Whether the rule applies to this record at all
    #[must_use]
    pub fn applies_to(&self, record: &Record) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(record))
    }

    /// Whether the rule rewrites `field`
    #[must_use]
    pub fn covers(&self, field: &str) -> bool {
        self.scope.as_ref().map_or(true, |s| s.allows(field))
    }

    /// Rewrite every configured group of every match in `value`.
    ///
    /// Returns the input unchanged, without allocating, when nothing matches.
    #[must_use]
    pub fn mask_value<'a>(&self, value: &'a str) -> Cow<'a, str> {
        if value.is_empty() {
            return Cow::Borrowed(value);
        }

        let mut ranges: Vec<Range<usize>> = Vec::new();
        for captures in self.pattern.captures_iter(value) {
            for &group in &self.groups {
                if let Some(m) = captures.get(group) {
                    ranges.push(m.range());
                }
            }
        }
        if ranges.is_empty() {
            return Cow::Borrowed(value);
        }

        // widest range first when several start together
        ranges.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut out = String::with_capacity(value.len());
        let mut cursor = 0;
        for range in ranges {
            if range.start < cursor {
                continue;
            }
            out.push_str(&value[cursor..range.start]);
            match self.mode {
                MaskMode::Mask => {
                    let width = value[range.clone()].chars().count();
                    out.extend(std::iter::repeat(MASK_CHAR).take(width));
                }
                MaskMode::Replace => out.push_str(&self.replace_word),
                MaskMode::Cut => {}
            }
            cursor = range.end;
        }
        out.push_str(&value[cursor..]);
        Cow::Owned(out)
    }

    /// Apply the rule to a record in place, returning how many fields changed
    pub fn apply(&self, record: &mut Record) -> usize {
        if !self.applies_to(record) {
            return 0;
        }

        let mut changed = 0;
        for (field, value) in record.iter_mut() {
            if !self.covers(field) {
                continue;
            }
            let masked = match self.mask_value(value.as_str()) {
                Cow::Borrowed(_) => continue,
                Cow::Owned(masked) => masked,
            };
            *value = masked;
            changed += 1;
        }
        changed
    }
}

/// Validate configured capture groups against the pattern
fn compile_groups(pattern: &Regex, configured: &[usize]) -> Result<Vec<usize>, MaskError> {
    let max = pattern.captures_len() - 1;
    if configured.is_empty() || max == 0 {
        return Ok(vec![0]);
    }

    let mut seen = HashSet::with_capacity(configured.len());
    for &group in configured {
        if group > max {
            return Err(MaskError::GroupOutOfRange { group, max });
        }
        if !seen.insert(group) {
            return Err(MaskError::DuplicateGroup { group });
        }
    }
    Ok(configured.to_vec())
}
