//! Left join of a primary dataset against a reference table.

use crate::dataset::{Dataset, FieldKind, FieldSpec, Record, Schema, Value};
use crate::error::{AggregationError, JoinSide, Result};
use crate::types::GroupKey;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Suffix appended to reference-only fields whose name collides with a primary field.
pub const COLLISION_SUFFIX: &str = "_ref";

/// Match counts of one left join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JoinSummary {
    /// Primary records whose key found a reference row.
    pub matched: usize,
    /// Primary records whose key found no reference row, including null keys.
    pub unmatched: usize,
}

/// Joins datasets against reference (dictionary) tables.
pub struct ReferenceJoiner;

impl ReferenceJoiner {
    /// Cardinality-preserving left join of `primary` with `reference` on `on`.
    ///
    /// The reference is de-duplicated on the key tuple keeping the first-seen
    /// row. Unmatched primary records get null for every reference-only
    /// field, and keys containing null never match.
    pub fn left_join(primary: &Dataset, reference: &Dataset, on: &[&str]) -> Result<Dataset> {
        Self::left_join_with_summary(primary, reference, on).map(|(joined, _)| joined)
    }

    /// [`left_join`](Self::left_join) plus how many primary records matched.
    pub fn left_join_with_summary(
        primary: &Dataset,
        reference: &Dataset,
        on: &[&str],
    ) -> Result<(Dataset, JoinSummary)> {
        check_keys(primary.schema(), JoinSide::Primary, on)?;
        check_keys(reference.schema(), JoinSide::Reference, on)?;

        // (reference field, output field) for every non-key reference column
        let carried: Vec<(String, Arc<str>)> = reference
            .schema()
            .names()
            .filter(|name| !on.contains(name))
            .map(|name| {
                let out = if primary.schema().contains(name) {
                    format!("{}{}", name, COLLISION_SUFFIX)
                } else {
                    name.to_string()
                };
                (name.to_string(), Arc::from(out.as_str()))
            })
            .collect();

        let mut lookup: HashMap<GroupKey, usize> = HashMap::with_capacity(reference.len());
        for (idx, record) in reference.records().iter().enumerate() {
            let key = key_of(record, on);
            if !key.has_null() {
                lookup.entry(key).or_insert(idx);
            }
        }
        debug!(
            "Reference table has {} unique keys out of {} rows",
            lookup.len(),
            reference.len()
        );

        let mut schema: Schema = primary.schema().clone();
        for (name, out) in &carried {
            let kind = reference
                .schema()
                .kind_of(name)
                .unwrap_or(FieldKind::Categorical);
            schema.push(FieldSpec::new(out.as_ref(), kind));
        }

        let mut matched = 0usize;
        let records: Vec<Record> = primary
            .records()
            .iter()
            .map(|record| {
                let key = key_of(record, on);
                let hit = if key.has_null() { None } else { lookup.get(&key) };
                let mut joined = record.clone();
                match hit {
                    Some(&idx) => {
                        matched += 1;
                        let source = &reference.records()[idx];
                        for (name, out) in &carried {
                            joined.set(Arc::clone(out), source.value(name).clone());
                        }
                    }
                    None => {
                        for (_, out) in &carried {
                            joined.set(Arc::clone(out), Value::Null);
                        }
                    }
                }
                joined
            })
            .collect();

        let summary = JoinSummary {
            matched,
            unmatched: records.len() - matched,
        };
        info!(
            "Joined {} rows on [{}]: {} matched, {} unmatched",
            records.len(),
            on.join(", "),
            summary.matched,
            summary.unmatched
        );

        Ok((Dataset::new(schema, records), summary))
    }
}

fn check_keys(schema: &Schema, side: JoinSide, on: &[&str]) -> Result<()> {
    let missing = schema.missing(on);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AggregationError::JoinKey {
            side,
            missing_fields: missing,
        })
    }
}

fn key_of(record: &Record, on: &[&str]) -> GroupKey {
    GroupKey::new(on.iter().map(|f| record.value(f).clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn diagnoses() -> Dataset {
        Dataset::from_rows(
            Schema::from_pairs([
                ("icd_code", FieldKind::Coded),
                ("icd_version", FieldKind::Numeric),
            ]),
            vec![
                vec![Value::text("4019"), Value::number(9.0)],
                vec![Value::text("I10"), Value::number(10.0)],
                vec![Value::text("4019"), Value::number(9.0)],
                vec![Value::text("ZZZ"), Value::number(10.0)],
                vec![Value::Null, Value::number(9.0)],
            ],
        )
    }

    fn dictionary() -> Dataset {
        Dataset::from_rows(
            Schema::from_pairs([
                ("icd_code", FieldKind::Coded),
                ("icd_version", FieldKind::Numeric),
                ("long_title", FieldKind::Categorical),
            ]),
            vec![
                vec![Value::text("4019"), Value::number(9.0), Value::text("Hypertension NOS")],
                vec![
                    Value::text("I10"),
                    Value::number(10.0),
                    Value::text("Essential hypertension"),
                ],
                vec![Value::text("4019"), Value::number(9.0), Value::text("Duplicate title")],
                vec![Value::Null, Value::number(9.0), Value::text("Null keyed")],
            ],
        )
    }

    // ========================================================================
    // left_join() tests
    // ========================================================================

    #[test]
    fn test_summary_counts_key_misses() {
        let (joined, summary) = ReferenceJoiner::left_join_with_summary(
            &diagnoses(),
            &dictionary(),
            &["icd_code", "icd_version"],
        )
        .unwrap();
        assert_eq!(joined.len(), 5);
        assert_eq!(
            summary,
            JoinSummary {
                matched: 3,
                unmatched: 2
            }
        );
    }

    #[test]
    fn test_left_join_preserves_cardinality_and_order() {
        let joined =
            ReferenceJoiner::left_join(&diagnoses(), &dictionary(), &["icd_code", "icd_version"])
                .unwrap();
        assert_eq!(joined.len(), 5);
        let titles: Vec<Value> = joined.column("long_title").cloned().collect();
        assert_eq!(
            titles,
            vec![
                Value::text("Hypertension NOS"),
                Value::text("Essential hypertension"),
                Value::text("Hypertension NOS"),
                Value::Null,
                Value::Null,
            ]
        );
    }

    #[test]
    fn test_null_keys_never_match() {
        let joined =
            ReferenceJoiner::left_join(&diagnoses(), &dictionary(), &["icd_code", "icd_version"])
                .unwrap();
        assert!(joined.records()[4].value("long_title").is_null());
    }

    #[test]
    fn test_version_is_part_of_key() {
        let primary = Dataset::from_rows(
            Schema::from_pairs([
                ("icd_code", FieldKind::Coded),
                ("icd_version", FieldKind::Numeric),
            ]),
            vec![vec![Value::text("4019"), Value::number(10.0)]],
        );
        let joined =
            ReferenceJoiner::left_join(&primary, &dictionary(), &["icd_code", "icd_version"])
                .unwrap();
        assert!(joined.records()[0].value("long_title").is_null());
    }

    #[test]
    fn test_colliding_reference_field_is_suffixed() {
        let primary = Dataset::from_rows(
            Schema::from_pairs([
                ("itemid", FieldKind::Identifier),
                ("label", FieldKind::Categorical),
            ]),
            vec![vec![Value::number(1.0), Value::text("local")]],
        );
        let reference = Dataset::from_rows(
            Schema::from_pairs([
                ("itemid", FieldKind::Identifier),
                ("label", FieldKind::Categorical),
            ]),
            vec![vec![Value::number(1.0), Value::text("Glucose")]],
        );
        let joined = ReferenceJoiner::left_join(&primary, &reference, &["itemid"]).unwrap();
        let record = &joined.records()[0];
        assert_eq!(record.value("label"), &Value::text("local"));
        assert_eq!(record.value("label_ref"), &Value::text("Glucose"));
        assert!(joined.schema().contains("label_ref"));
    }

    #[test]
    fn test_missing_key_reports_side() {
        let err = ReferenceJoiner::left_join(&diagnoses(), &dictionary(), &["icd_code", "seq_num"])
            .unwrap_err();
        match err {
            AggregationError::JoinKey {
                side,
                missing_fields,
            } => {
                assert_eq!(side, JoinSide::Primary);
                assert_eq!(missing_fields, vec!["seq_num"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        let reference = Dataset::from_rows(
            Schema::from_pairs([("long_title", FieldKind::Categorical)]),
            Vec::<Vec<Value>>::new(),
        );
        let err = ReferenceJoiner::left_join(&diagnoses(), &reference, &["icd_code"]).unwrap_err();
        assert!(matches!(
            err,
            AggregationError::JoinKey {
                side: JoinSide::Reference,
                ..
            }
        ));
    }

    #[test]
    fn test_reference_is_shared_across_threads() {
        let reference = dictionary();
        let primary = diagnoses();
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    s.spawn(|| {
                        let on = ["icd_code", "icd_version"];
                        ReferenceJoiner::left_join(&primary, &reference, &on).map(|d| d.len())
                    })
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap().unwrap(), 5);
            }
        });
    }
}
