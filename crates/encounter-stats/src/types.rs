use crate::dataset::Value;
use crate::error::{AggregationError, Result, Stage};
use serde::Serialize;
use std::fmt;

// ============================================================================
// Statistic Values
// ============================================================================

/// A statistic that may be undefined.
///
/// Undefined statistics (mean of a group with no valid values, percent of an
/// empty dataset) are reported as [`StatValue::NoData`], never as NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Value(f64),
    NoData,
}

impl StatValue {
    pub fn from_option(value: Option<f64>) -> Self {
        value.map_or(StatValue::NoData, StatValue::Value)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            StatValue::Value(v) => Some(*v),
            StatValue::NoData => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, StatValue::NoData)
    }

    /// The value, or an [`AggregationError::EmptyGroup`] naming `what`.
    pub fn require(&self, stage: Stage, what: &str) -> Result<f64> {
        self.value().ok_or_else(|| AggregationError::EmptyGroup {
            stage,
            what: what.to_string(),
        })
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Value(v) => write!(f, "{:.2}", v),
            StatValue::NoData => f.write_str("no data"),
        }
    }
}

// ============================================================================
// Group Keys and Aggregates
// ============================================================================

/// Ordered tuple of group-by values identifying one aggregation bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GroupKey(Vec<Value>);

impl GroupKey {
    pub fn new(values: Vec<Value>) -> Self {
        GroupKey(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when any component is null.
    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }
}

impl<V: Into<Value>> From<Vec<V>> for GroupKey {
    fn from(values: Vec<V>) -> Self {
        GroupKey(values.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// Summary statistics of one group.
///
/// Statistics that were not requested are `None`. `valid_count` is the
/// number of records whose measure coerced to a number; it equals `count`
/// when no measure was aggregated, and it is the weight used when
/// recombining means across partitions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAggregate {
    pub key: GroupKey,
    pub count: usize,
    pub valid_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<StatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<StatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<StatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_rate: Option<StatValue>,
}

static_assertions::assert_impl_all!(GroupAggregate: Send, Sync);

impl GroupAggregate {
    /// An aggregate carrying only a count.
    pub fn counted(key: GroupKey, count: usize) -> Self {
        Self {
            key,
            count,
            valid_count: count,
            percent: None,
            mean: None,
            median: None,
            missing_rate: None,
        }
    }

    /// Number of records whose measure was null or not numeric.
    pub fn missing_count(&self) -> usize {
        self.count.saturating_sub(self.valid_count)
    }
}

// ============================================================================
// Ranking and Histogram Outputs
// ============================================================================

/// A group aggregate with its 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub rank: usize,
    /// Count as a percentage of the total across all ranked groups.
    pub percent_of_total: StatValue,
    #[serde(flatten)]
    pub aggregate: GroupAggregate,
}

/// A half-open interval `[lo, hi)` and its membership count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
}

impl HistogramBin {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value < self.hi
    }
}

/// Ordered bins plus the values that fell outside them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub bins: Vec<HistogramBin>,
    /// Values below the first edge.
    pub below: usize,
    /// Values at or above the last edge, plus NaN.
    pub above: usize,
    /// Cells that were null or not numeric (field bucketing only).
    pub missing: usize,
}

static_assertions::assert_impl_all!(Histogram: Send, Sync);

impl Histogram {
    /// Values excluded from every bin.
    pub fn out_of_range(&self) -> usize {
        self.below + self.above
    }

    pub fn binned(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}
