//! Coercion rules applied per field by the cleaner.

use serde::{Deserialize, Serialize};

/// Default marker substituted for missing categorical values.
pub const DEFAULT_MISSING_MARKER: &str = "UNKNOWN";

/// How one field is normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum CoercionRule {
    /// Parse to a timestamp; records with an unparsable or null value are dropped.
    ParseTemporal,
    /// Parse to a number; unparsable values become null and the record is kept.
    ParseNumeric,
    /// Trim to text; null or blank values become `missing_marker`.
    NormalizeCategory { missing_marker: String },
    /// Parse to a number, clamp above `threshold`, then remap `anchor` to `replacement`.
    ClipAndRemap {
        threshold: f64,
        anchor: f64,
        replacement: f64,
    },
}

impl CoercionRule {
    /// Category normalization with the default `"UNKNOWN"` marker.
    pub fn normalize_category() -> Self {
        CoercionRule::NormalizeCategory {
            missing_marker: DEFAULT_MISSING_MARKER.to_string(),
        }
    }

    /// Whether a failure under this rule drops the whole record.
    pub fn drops_record_on_failure(&self) -> bool {
        matches!(self, CoercionRule::ParseTemporal)
    }
}

/// Ordered mapping from field name to coercion rule.
///
/// Rules run in insertion order; a second rule for the same field replaces
/// the first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoercionRules {
    rules: Vec<(String, CoercionRule)>,
}

impl CoercionRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the rule for `field`.
    pub fn rule(mut self, field: impl Into<String>, rule: CoercionRule) -> Self {
        let field = field.into();
        match self.rules.iter_mut().find(|(f, _)| *f == field) {
            Some((_, existing)) => *existing = rule,
            None => self.rules.push((field, rule)),
        }
        self
    }

    pub fn get(&self, field: &str) -> Option<&CoercionRule> {
        self.rules.iter().find(|(f, _)| f == field).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CoercionRule)> {
        self.rules.iter().map(|(f, r)| (f.as_str(), r))
    }

    pub fn fields(&self) -> Vec<&str> {
        self.rules.iter().map(|(f, _)| f.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
