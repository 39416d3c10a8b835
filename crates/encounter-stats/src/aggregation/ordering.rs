//! Explicit category orderings for grouped output.

use super::temporal::WEEKDAYS;
use crate::dataset::Value;
use crate::types::GroupAggregate;
use serde::{Deserialize, Serialize};

/// Orders groups by the position of one grouped field's value in `categories`.
///
/// Values not listed keep their relative order after all listed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryOrder {
    pub field: String,
    pub categories: Vec<String>,
}

impl CategoryOrder {
    pub fn new(
        field: impl Into<String>,
        categories: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            field: field.into(),
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }

    /// Monday through Sunday.
    pub fn weekdays(field: impl Into<String>) -> Self {
        Self::new(field, WEEKDAYS)
    }

    /// Hours 0 through 23.
    pub fn hours(field: impl Into<String>) -> Self {
        Self::new(field, (0..24).map(|h: u32| h.to_string()))
    }

    /// Position of `value` in the ordering, if listed.
    pub fn position(&self, value: &Value) -> Option<usize> {
        let rendered = value.to_string();
        self.categories.iter().position(|c| *c == rendered)
    }

    /// Stable-sort `groups` whose key holds this field at `key_index`.
    pub(crate) fn apply(&self, groups: &mut [GroupAggregate], key_index: usize) {
        groups.sort_by_key(|g| {
            g.key
                .get(key_index)
                .and_then(|v| self.position(v))
                .unwrap_or(usize::MAX)
        });
    }
}
