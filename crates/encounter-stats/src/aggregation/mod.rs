//! Grouping and aggregation engine.
//!
//! Records are grouped by the exact tuple of their group-by values (null is
//! a group of its own) and each group is reduced to a [`GroupAggregate`].
//! Output order is first occurrence unless a [`CategoryOrder`] says
//! otherwise.

mod ordering;
pub mod statistics;
pub mod temporal;

pub use ordering::CategoryOrder;

use crate::dataset::{Tabular, Value};
use crate::error::{AggregationError, Result, Stage};
use crate::types::{GroupAggregate, GroupKey, StatValue};
use crate::utils::percent_of;
use crate::validator::SchemaValidator;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// A statistic the engine can compute per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Count,
    Percent,
    Mean,
    Median,
    MissingRate,
}

impl Stat {
    /// Whether the statistic is computed over a measure field.
    pub fn needs_measure(&self) -> bool {
        matches!(self, Stat::Mean | Stat::Median | Stat::MissingRate)
    }
}

/// What to group by, what to measure, and which statistics to report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub group_by: Vec<String>,
    pub measure: Option<String>,
    pub stats: BTreeSet<Stat>,
    pub ordering: Option<CategoryOrder>,
}

impl AggregationSpec {
    /// A count-only spec with no grouping.
    pub fn new() -> Self {
        Self {
            stats: BTreeSet::from([Stat::Count]),
            ..Default::default()
        }
    }

    pub fn group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn measure(mut self, field: impl Into<String>) -> Self {
        self.measure = Some(field.into());
        self
    }

    pub fn stats(mut self, stats: impl IntoIterator<Item = Stat>) -> Self {
        self.stats.extend(stats);
        self
    }

    pub fn order_by(mut self, ordering: CategoryOrder) -> Self {
        self.ordering = Some(ordering);
        self
    }

    pub fn wants(&self, stat: Stat) -> bool {
        self.stats.contains(&stat)
    }

    fn validate<T: Tabular + ?Sized>(&self, data: &T) -> Result<()> {
        let mut fields: Vec<&str> = self.group_by.iter().map(String::as_str).collect();
        if let Some(measure) = &self.measure {
            fields.push(measure);
        }
        SchemaValidator::check(data, &fields, Stage::Aggregation)?;

        if self.measure.is_none()
            && let Some(stat) = self.stats.iter().find(|s| s.needs_measure())
        {
            return Err(AggregationError::invalid_config(
                Stage::Aggregation,
                format!("{:?} requires a measure field", stat),
            ));
        }

        if let Some(order) = &self.ordering
            && !self.group_by.contains(&order.field)
        {
            return Err(AggregationError::invalid_config(
                Stage::Aggregation,
                format!("cannot order by '{}': it is not a group-by field", order.field),
            ));
        }
        Ok(())
    }
}

/// Unique non-null values of one field within a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupValues {
    pub key: GroupKey,
    pub values: Vec<Value>,
}

impl GroupValues {
    pub fn unique_count(&self) -> usize {
        self.values.len()
    }
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    valid: Vec<f64>,
}

/// Computes grouped statistics over any [`Tabular`] source.
pub struct AggregationEngine;

impl AggregationEngine {
    /// Group `data` per `spec` and reduce each group.
    ///
    /// With an empty `group_by` there is exactly one group, even for an empty
    /// dataset.
    pub fn aggregate<T: Tabular + ?Sized>(
        data: &T,
        spec: &AggregationSpec,
    ) -> Result<Vec<GroupAggregate>> {
        spec.validate(data)?;

        let mut index: HashMap<GroupKey, usize> = HashMap::new();
        let mut groups: Vec<(GroupKey, Accumulator)> = Vec::new();
        if spec.group_by.is_empty() {
            groups.push((GroupKey::default(), Accumulator::default()));
            index.insert(GroupKey::default(), 0);
        }

        for record in data.records() {
            let key = GroupKey::new(
                spec.group_by
                    .iter()
                    .map(|f| record.value(f).clone())
                    .collect(),
            );
            let slot = match index.get(&key) {
                Some(&slot) => slot,
                None => {
                    groups.push((key.clone(), Accumulator::default()));
                    index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            let acc = &mut groups[slot].1;
            acc.count += 1;
            if let Some(measure) = &spec.measure
                && let Some(v) = record.value(measure).as_f64()
            {
                acc.valid.push(v);
            }
        }

        let total = data.len();
        let mut out: Vec<GroupAggregate> = groups
            .into_iter()
            .map(|(key, acc)| reduce(key, acc, total, spec))
            .collect();

        if let Some(order) = &spec.ordering
            && let Some(pos) = spec.group_by.iter().position(|f| *f == order.field)
        {
            order.apply(&mut out, pos);
        }

        debug!(
            "Aggregated {} records into {} groups by [{}]",
            total,
            out.len(),
            spec.group_by.join(", ")
        );
        Ok(out)
    }

    /// Ungrouped statistics over the whole dataset.
    ///
    /// An empty dataset yields count 0 and `NoData` statistics.
    pub fn summarize<T: Tabular + ?Sized>(
        data: &T,
        measure: &str,
        stats: impl IntoIterator<Item = Stat>,
    ) -> Result<GroupAggregate> {
        let spec = AggregationSpec::new().measure(measure).stats(stats);
        Self::aggregate(data, &spec)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AggregationError::Internal("ungrouped aggregation produced no group".into())
            })
    }

    /// Unique non-null values of `field` per group, in first-seen order.
    pub fn distinct_values<T: Tabular + ?Sized>(
        data: &T,
        group_by: &[&str],
        field: &str,
    ) -> Result<Vec<GroupValues>> {
        let mut required: Vec<&str> = group_by.to_vec();
        required.push(field);
        SchemaValidator::check(data, &required, Stage::Aggregation)?;

        let mut index: HashMap<GroupKey, usize> = HashMap::new();
        let mut out: Vec<(GroupValues, HashSet<Value>)> = Vec::new();

        for record in data.records() {
            let key = GroupKey::new(group_by.iter().map(|f| record.value(f).clone()).collect());
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                out.push((
                    GroupValues {
                        key,
                        values: Vec::new(),
                    },
                    Default::default(),
                ));
                out.len() - 1
            });
            let value = record.value(field);
            let (group, seen) = &mut out[slot];
            if !value.is_null() && seen.insert(value.clone()) {
                group.values.push(value.clone());
            }
        }

        Ok(out.into_iter().map(|(group, _)| group).collect())
    }
}

fn reduce(key: GroupKey, acc: Accumulator, total: usize, spec: &AggregationSpec) -> GroupAggregate {
    let valid_count = if spec.measure.is_some() {
        acc.valid.len()
    } else {
        acc.count
    };

    let mut aggregate = GroupAggregate::counted(key, acc.count);
    aggregate.valid_count = valid_count;

    if spec.wants(Stat::Percent) {
        aggregate.percent = Some(StatValue::from_option(percent_of(acc.count, total)));
    }
    if spec.wants(Stat::Mean) {
        aggregate.mean = Some(StatValue::from_option(statistics::mean(&acc.valid)));
    }
    if spec.wants(Stat::Median) {
        aggregate.median = Some(StatValue::from_option(statistics::median(&acc.valid)));
    }
    if spec.wants(Stat::MissingRate) {
        aggregate.missing_rate = Some(StatValue::from_option(percent_of(
            acc.count - valid_count,
            acc.count,
        )));
    }
    aggregate
}
