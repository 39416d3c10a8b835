//! Clinical analyses built on the aggregation engine.
//!
//! Each analysis validates its required fields, cleans them with explicit
//! coercion rules, and reduces the result to engine calls:
//!
//! - [`AdmissionsAnalysis`]: peak admission hours/weekdays and discharge destinations
//! - [`LengthOfStayAnalysis`]: stay summary statistics and histogram
//! - [`DiagnosisAnalysis`]: top diagnoses with descriptions, unique codes per patient
//! - [`LabAnalysis`]: per-test mean value and missing percent
//! - [`PatientAnalysis`]: gender distribution, age statistics, split age analysis

mod admissions;
mod diagnoses;
mod labs;
mod length_of_stay;
mod patients;

pub use admissions::{AdmissionsAnalysis, AdmissionsReport};
pub use diagnoses::{
    DiagnosisAnalysis, DiagnosisEntry, PatientDiagnoses, TopDiagnoses, UniqueDiagnoses,
};
pub use labs::{LabAnalysis, LabStatistic, LabStatistics};
pub use length_of_stay::{LengthOfStayAnalysis, LengthOfStayReport, StaySummary};
pub use patients::{AgeSummary, GenderDistribution, PartitionAge, PatientAnalysis, SplitAgeReport};

use crate::cleaner::{CleaningReport, CoercionRules, DataCleaner};
use crate::dataset::{Dataset, Value};
use crate::error::Result;
use crate::types::{GroupAggregate, RankedEntry, StatValue};
use crate::utils::format_number;
use crate::validator::SchemaValidator;
use serde::Serialize;

/// One category with its count and share of the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: String,
    pub count: usize,
    pub percent: StatValue,
}

impl CategoryShare {
    /// Share from a single-field group aggregate computed with percent.
    pub(crate) fn from_aggregate(group: &GroupAggregate) -> Self {
        Self {
            category: first_key(group),
            count: group.count,
            percent: group.percent.unwrap_or(StatValue::NoData),
        }
    }

    pub(crate) fn from_ranked(entry: &RankedEntry) -> Self {
        Self {
            category: first_key(&entry.aggregate),
            count: entry.aggregate.count,
            percent: entry.percent_of_total,
        }
    }
}

fn first_key(group: &GroupAggregate) -> String {
    group
        .key
        .get(0)
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// Validate `required` fields, then clean with `rules`.
pub(crate) fn prepare(
    data: Dataset,
    required: &[&str],
    rules: &CoercionRules,
) -> Result<(Dataset, CleaningReport)> {
    let data = SchemaValidator::validate(data, required)?;
    DataCleaner.clean(data, rules)
}

/// Trimmed code text; null or blank becomes null.
///
/// Integral numbers render without a fractional part so codes read from a
/// numeric column still match their text form.
pub(crate) fn code_text(value: &Value) -> Value {
    let text = match value {
        Value::Null => return Value::Null,
        Value::Text(s) => s.trim().to_string(),
        Value::Number(v) => format_number(*v),
        Value::Timestamp(_) => value.to_string(),
    };
    if text.is_empty() {
        Value::Null
    } else {
        Value::Text(text)
    }
}
