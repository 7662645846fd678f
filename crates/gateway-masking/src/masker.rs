//! Ordered application of masking rules.

use crate::config::MaskingConfig;
use crate::error::MaskError;
use crate::mask::Mask;
use crate::scope::FieldScope;
use crate::Record;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{info, trace};

/// Applies compiled rules, in configured order, to records and bucket keys.
///
/// Built once at startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct Masker {
    masks: Vec<Mask>,
}

impl Masker {
    /// Compile every configured rule
    ///
    /// # Errors
    /// Returns the first rule that fails to compile, tagged with its position,
    /// or a scope error for conflicting global field lists
    pub fn new(config: &MaskingConfig) -> Result<Self, MaskError> {
        let global = FieldScope::from_lists(&config.process_fields, &config.ignore_fields)?
            .map(Arc::new);

        let masks = config
            .masks
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                Mask::compile(rule, global.as_ref()).map_err(|err| err.in_rule(index))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            masks = masks.len(),
            global_scope = global.is_some(),
            "Masker initialized"
        );
        Ok(Self { masks })
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// Whether there are no rules
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// The compiled rules
    #[must_use]
    pub fn masks(&self) -> &[Mask] {
        &self.masks
    }

    /// Redact a record in place
    pub fn mask(&self, record: &mut Record) {
        for (index, mask) in self.masks.iter().enumerate() {
            let changed = mask.apply(record);
            if changed > 0 {
                trace!(mask = index, fields = changed, "Mask applied");
            }
        }
    }

    /// Redact aggregation bucket keys grouped by `field`.
    ///
    /// Only field scoping applies. Filter sets are not evaluated since there
    /// is no record, so a filtered rule redacts every bucket in its scope.
    pub fn mask_agg(&self, field: &str, bucket_keys: &mut [String]) {
        for mask in &self.masks {
            if !mask.covers(field) {
                continue;
            }
            for key in bucket_keys.iter_mut() {
                let masked = match mask.mask_value(key.as_str()) {
                    Cow::Borrowed(_) => continue,
                    Cow::Owned(masked) => masked,
                };
                *key = masked;
            }
        }
    }
}
