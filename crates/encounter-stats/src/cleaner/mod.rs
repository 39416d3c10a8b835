//! Field cleaning and type coercion.
//!
//! This module normalizes raw cell values into typed values:
//! - Temporal fields are parsed; records with invalid timestamps are dropped
//! - Numeric fields are parsed; failures become null and the record is kept
//! - Categorical fields are trimmed and missing values get a marker
//! - The age-capping clip-and-remap policy
//!
//! Coercion failures are non-fatal. They are counted per field in the
//! [`CleaningReport`] so they surface as missing values downstream.

mod converters;
mod rules;

pub use rules::{CoercionRule, CoercionRules, DEFAULT_MISSING_MARKER};

use crate::dataset::{Dataset, FieldKind, FieldSpec, Record, Schema, Value};
use crate::error::{AggregationError, Result, Stage};
use converters::{Coerced, clip_and_remap, normalize_category, to_numeric, to_temporal};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A value that failed type coercion and was replaced by null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoercionWarning {
    pub field: String,
    /// Number of non-null values that failed to coerce.
    pub failures: usize,
    /// The first raw value that failed.
    pub sample: String,
}

/// What the cleaner did to a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningReport {
    pub rows_before: usize,
    pub rows_after: usize,
    /// Records dropped because a temporal field was null or unparsable.
    pub rows_dropped: usize,
    pub warnings: Vec<CoercionWarning>,
    pub actions: Vec<String>,
}

impl CleaningReport {
    /// Coercion failures recorded for `field`.
    pub fn failures_for(&self, field: &str) -> usize {
        self.warnings
            .iter()
            .find(|w| w.field == field)
            .map_or(0, |w| w.failures)
    }
}

/// Applies [`CoercionRules`] to datasets.
pub struct DataCleaner;

impl DataCleaner {
    /// Clean `dataset` with `rules`.
    ///
    /// Every field named by a rule must be declared in the schema, otherwise
    /// the whole call fails with a schema error before any record is touched.
    pub fn clean(
        &self,
        dataset: Dataset,
        rules: &CoercionRules,
    ) -> Result<(Dataset, CleaningReport)> {
        let missing = dataset.schema().missing(&rules.fields());
        if !missing.is_empty() {
            return Err(AggregationError::schema(Stage::Cleaning, missing));
        }

        info!("Cleaning {} rows with {} coercion rules...", dataset.len(), rules.len());

        let (schema, records) = dataset.into_parts();
        let schema = retyped_schema(schema, rules);
        let keys: Vec<(Arc<str>, &CoercionRule)> = rules
            .iter()
            .map(|(field, rule)| (Arc::from(field), rule))
            .collect();

        let rows_before = records.len();
        let mut failures: BTreeMap<String, (usize, String)> = BTreeMap::new();
        let mut dropped_by_field: BTreeMap<String, usize> = BTreeMap::new();
        let mut cleaned = Vec::with_capacity(rows_before);

        'records: for record in records {
            let mut out: Record = record;
            for (field, rule) in &keys {
                let raw = out.value(field).clone();
                let outcome = apply_rule(&raw, rule);

                let value = match outcome {
                    Coerced::Ok(value) => value,
                    Coerced::Null if rule.drops_record_on_failure() => {
                        *dropped_by_field.entry(field.to_string()).or_insert(0) += 1;
                        continue 'records;
                    }
                    Coerced::Null => Value::Null,
                    Coerced::Failed => {
                        let entry = failures
                            .entry(field.to_string())
                            .or_insert_with(|| (0, raw.to_string()));
                        entry.0 += 1;
                        if rule.drops_record_on_failure() {
                            *dropped_by_field.entry(field.to_string()).or_insert(0) += 1;
                            continue 'records;
                        }
                        Value::Null
                    }
                };
                out.set(Arc::clone(field), value);
            }
            cleaned.push(out);
        }

        let rows_after = cleaned.len();
        let mut actions = Vec::new();
        for (field, dropped) in &dropped_by_field {
            actions.push(format!(
                "Dropped {} rows with missing or invalid '{}' timestamps",
                dropped, field
            ));
            debug!("Dropped {} rows with invalid '{}'", dropped, field);
        }

        let warnings: Vec<CoercionWarning> = failures
            .into_iter()
            .map(|(field, (count, sample))| {
                warn!(
                    "{} values in '{}' failed coercion and were set to null (e.g. {:?})",
                    count, field, sample
                );
                actions.push(format!("Set {} unparsable '{}' values to null", count, field));
                CoercionWarning {
                    field,
                    failures: count,
                    sample,
                }
            })
            .collect();

        if actions.is_empty() {
            actions.push("No values required coercion fixes".to_string());
        }

        info!("Cleaning complete: {} -> {} rows", rows_before, rows_after);

        Ok((
            Dataset::new(schema, cleaned),
            CleaningReport {
                rows_before,
                rows_after,
                rows_dropped: rows_before - rows_after,
                warnings,
                actions,
            },
        ))
    }
}

fn apply_rule(raw: &Value, rule: &CoercionRule) -> Coerced {
    match rule {
        CoercionRule::ParseTemporal => to_temporal(raw),
        CoercionRule::ParseNumeric => to_numeric(raw),
        CoercionRule::NormalizeCategory { missing_marker } => {
            Coerced::Ok(normalize_category(raw, missing_marker))
        }
        CoercionRule::ClipAndRemap {
            threshold,
            anchor,
            replacement,
        } => clip_and_remap(raw, *threshold, *anchor, *replacement),
    }
}

/// Update declared kinds to what the rules produce.
fn retyped_schema(schema: Schema, rules: &CoercionRules) -> Schema {
    let fields = schema
        .fields()
        .iter()
        .map(|field| {
            let kind = match rules.get(&field.name) {
                Some(CoercionRule::ParseTemporal) => FieldKind::Temporal,
                Some(CoercionRule::ParseNumeric | CoercionRule::ClipAndRemap { .. }) => {
                    FieldKind::Numeric
                }
                Some(CoercionRule::NormalizeCategory { .. })
                    if field.kind == FieldKind::Numeric =>
                {
                    FieldKind::Categorical
                }
                _ => field.kind,
            };
            FieldSpec::new(field.name.clone(), kind)
        })
        .collect();
    Schema::new(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Tabular;
    use pretty_assertions::assert_eq;

    fn admissions() -> Dataset {
        Dataset::from_rows(
            Schema::from_pairs([
                ("admittime", FieldKind::Categorical),
                ("discharge_location", FieldKind::Categorical),
                ("los", FieldKind::Categorical),
            ]),
            vec![
                vec![Value::text("2180-05-06 22:23:00"), Value::text(" HOME "), Value::text("3.5")],
                vec![Value::text("garbage"), Value::text("SNF"), Value::text("1")],
                vec![Value::Null, Value::Null, Value::text("2")],
                vec![Value::text("2180-05-07 01:00:00"), Value::Null, Value::text("n/a")],
            ],
        )
    }

    fn rules() -> CoercionRules {
        CoercionRules::new()
            .rule("admittime", CoercionRule::ParseTemporal)
            .rule("discharge_location", CoercionRule::normalize_category())
            .rule("los", CoercionRule::ParseNumeric)
    }

    #[test]
    fn test_temporal_failures_drop_records() {
        let (ds, report) = DataCleaner.clean(admissions(), &rules()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(report.rows_before, 4);
        assert_eq!(report.rows_after, 2);
        assert_eq!(report.rows_dropped, 2);
        assert!(matches!(ds.records()[0].value("admittime"), Value::Timestamp(_)));
        // "garbage" is a coercion failure; the null admittime is not
        assert_eq!(report.failures_for("admittime"), 1);
    }

    #[test]
    fn test_numeric_failures_keep_records_as_null() {
        let (ds, report) = DataCleaner.clean(admissions(), &rules()).unwrap();
        let los: Vec<Value> = ds.column("los").cloned().collect();
        assert_eq!(los, vec![Value::number(3.5), Value::Null]);
        assert_eq!(report.failures_for("los"), 1);
        let warning = report.warnings.iter().find(|w| w.field == "los").unwrap();
        assert_eq!(warning.sample, "n/a");
    }

    #[test]
    fn test_category_marker() {
        let (ds, _) = DataCleaner.clean(admissions(), &rules()).unwrap();
        let locations: Vec<Value> = ds.column("discharge_location").cloned().collect();
        assert_eq!(locations, vec![Value::text("HOME"), Value::text("UNKNOWN")]);
    }

    #[test]
    fn test_schema_is_retyped() {
        let (ds, _) = DataCleaner.clean(admissions(), &rules()).unwrap();
        assert_eq!(ds.schema().kind_of("admittime"), Some(FieldKind::Temporal));
        assert_eq!(ds.schema().kind_of("los"), Some(FieldKind::Numeric));
    }

    #[test]
    fn test_rule_on_undeclared_field_is_schema_error() {
        let rules = rules().rule("dischtime", CoercionRule::ParseTemporal);
        let err = DataCleaner.clean(admissions(), &rules).unwrap_err();
        assert!(matches!(err, AggregationError::Schema { stage: Stage::Cleaning, .. }));
        assert_eq!(err.missing_fields(), ["dischtime"]);
    }

    #[test]
    fn test_age_cap_policy() {
        let ds = Dataset::from_rows(
            Schema::from_pairs([("anchor_age", FieldKind::Numeric)]),
            vec![
                vec![Value::number(70.0)],
                vec![Value::number(89.0)],
                vec![Value::number(95.0)],
            ],
        );
        let rules = CoercionRules::new().rule(
            "anchor_age",
            CoercionRule::ClipAndRemap {
                threshold: 89.0,
                anchor: 89.0,
                replacement: 91.0,
            },
        );
        let (ds, report) = DataCleaner.clean(ds, &rules).unwrap();
        let ages: Vec<f64> = ds.column("anchor_age").filter_map(Value::as_f64).collect();
        assert_eq!(ages, vec![70.0, 91.0, 91.0]);
        assert!(report.warnings.is_empty());
        assert_eq!(Tabular::len(&ds), 3);
    }
}
