use super::prepare;
use crate::aggregation::{AggregationEngine, AggregationSpec, Stat};
use crate::cleaner::{CoercionRule, CoercionRules};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::join::ReferenceJoiner;
use crate::types::StatValue;
use serde::Serialize;
use tracing::{debug, info};

const ITEMID: &str = "itemid";
const VALUE: &str = "value";
const LABEL: &str = "label";

/// Statistics of one lab test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabStatistic {
    /// Test label; `None` for events whose item is not in the dictionary.
    pub label: Option<String>,
    pub events: usize,
    /// Mean of the values that are numbers.
    pub mean_value: StatValue,
    /// Share of events with a null or non-numeric value.
    pub missing_percent: StatValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabStatistics {
    pub tests: Vec<LabStatistic>,
    /// Events whose `itemid` matched no dictionary row.
    pub unmatched_events: usize,
}

pub struct LabAnalysis;

impl LabAnalysis {
    /// Mean value and missing percent per test label.
    ///
    /// `labevents` needs `itemid` and `value`; `labitems` needs `itemid` and
    /// `label`. Events are labeled by a left join on `itemid`, so unmatched
    /// events form their own null-labeled group.
    pub fn run(&self, labevents: Dataset, labitems: Dataset) -> Result<LabStatistics> {
        info!("Computing lab statistics...");
        let item_rule = CoercionRules::new().rule(ITEMID, CoercionRule::ParseNumeric);
        let (events, _) = prepare(labevents, &[ITEMID, VALUE], &item_rule)?;
        let (items, _) = prepare(labitems, &[ITEMID, LABEL], &item_rule)?;

        let (labeled, join) = ReferenceJoiner::left_join_with_summary(&events, &items, &[ITEMID])?;
        let unmatched_events = join.unmatched;
        debug!("{} lab events without a dictionary row", unmatched_events);

        let groups = AggregationEngine::aggregate(
            &labeled,
            &AggregationSpec::new()
                .group_by([LABEL])
                .measure(VALUE)
                .stats([Stat::Mean, Stat::MissingRate]),
        )?;

        let tests = groups
            .iter()
            .map(|group| LabStatistic {
                label: group.key.get(0).and_then(|v| v.as_str()).map(str::to_string),
                events: group.count,
                mean_value: group.mean.unwrap_or(StatValue::NoData),
                missing_percent: group.missing_rate.unwrap_or(StatValue::NoData),
            })
            .collect();

        Ok(LabStatistics {
            tests,
            unmatched_events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{FieldKind, Schema, Value};
    use pretty_assertions::assert_eq;

    fn labevents() -> Dataset {
        Dataset::from_rows(
            Schema::from_pairs([(ITEMID, FieldKind::Identifier), (VALUE, FieldKind::Categorical)]),
            vec![
                vec![Value::number(50931.0), Value::text("100")],
                vec![Value::number(50983.0), Value::text("140")],
                vec![Value::text("50931"), Value::text("120")],
                vec![Value::number(50931.0), Value::Null],
                vec![Value::number(51000.0), Value::text("NEG")],
                vec![Value::number(50983.0), Value::text("138")],
            ],
        )
    }

    fn labitems() -> Dataset {
        Dataset::from_rows(
            Schema::from_pairs([(ITEMID, FieldKind::Identifier), (LABEL, FieldKind::Categorical)]),
            vec![
                vec![Value::number(50931.0), Value::text("Glucose")],
                vec![Value::number(50983.0), Value::text("Sodium")],
            ],
        )
    }

    #[test]
    fn test_lab_statistics() {
        let stats = LabAnalysis.run(labevents(), labitems()).unwrap();

        assert_eq!(
            stats.tests,
            vec![
                LabStatistic {
                    label: Some("Glucose".to_string()),
                    events: 3,
                    mean_value: StatValue::Value(110.0),
                    missing_percent: StatValue::Value(33.33),
                },
                LabStatistic {
                    label: Some("Sodium".to_string()),
                    events: 2,
                    mean_value: StatValue::Value(139.0),
                    missing_percent: StatValue::Value(0.0),
                },
                LabStatistic {
                    label: None,
                    events: 1,
                    mean_value: StatValue::NoData,
                    missing_percent: StatValue::Value(100.0),
                },
            ]
        );
        assert_eq!(stats.unmatched_events, 1);
    }

    #[test]
    fn test_null_label_is_not_an_unmatched_event() {
        let items = Dataset::from_rows(
            Schema::from_pairs([(ITEMID, FieldKind::Identifier), (LABEL, FieldKind::Categorical)]),
            vec![
                vec![Value::number(50931.0), Value::text("Glucose")],
                vec![Value::number(50983.0), Value::Null],
            ],
        );
        let stats = LabAnalysis.run(labevents(), items).unwrap();

        // the two sodium events matched a row without a label
        assert_eq!(stats.unmatched_events, 1);
        let unlabeled = stats.tests.iter().find(|t| t.label.is_none()).unwrap();
        assert_eq!(unlabeled.events, 3);
    }

    #[test]
    fn test_missing_dictionary_field() {
        let items = Dataset::from_rows(
            Schema::from_pairs([(ITEMID, FieldKind::Identifier)]),
            Vec::<Vec<Value>>::new(),
        );
        let err = LabAnalysis.run(labevents(), items).unwrap_err();
        assert_eq!(err.missing_fields(), [LABEL]);
    }
}
