//! Length of stay in fractional days.

use super::prepare;
use crate::aggregation::temporal::days_between;
use crate::aggregation::{AggregationEngine, Stat};
use crate::cleaner::{CleaningReport, CoercionRule, CoercionRules};
use crate::config::AnalysisConfig;
use crate::dataset::{Dataset, FieldKind, Value};
use crate::error::Result;
use crate::histogram::bucketize_field;
use crate::types::{Histogram, StatValue};
use serde::Serialize;
use tracing::{debug, info};

const ADMITTIME: &str = "admittime";
const DISCHTIME: &str = "dischtime";
const LOS_DAYS: &str = "los_days";

/// Mean and median over valid stays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaySummary {
    pub mean: StatValue,
    pub median: StatValue,
    /// Number of valid stays included.
    pub count_used: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LengthOfStayReport {
    pub summary: StaySummary,
    pub histogram: Histogram,
    /// Stays at or below the configured minimum (zero or negative by default).
    pub invalid_stays: usize,
    pub cleaning: CleaningReport,
}

pub struct LengthOfStayAnalysis<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> LengthOfStayAnalysis<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Requires `admittime` and `dischtime`.
    pub fn run(&self, admissions: Dataset) -> Result<LengthOfStayReport> {
        info!("Analyzing length of stay...");
        let rules = CoercionRules::new()
            .rule(ADMITTIME, CoercionRule::ParseTemporal)
            .rule(DISCHTIME, CoercionRule::ParseTemporal);
        let (data, cleaning) = prepare(admissions, &[ADMITTIME, DISCHTIME], &rules)?;

        let with_los = data.with_derived_field(LOS_DAYS, FieldKind::Numeric, |r| {
            match (r.value(ADMITTIME).as_timestamp(), r.value(DISCHTIME).as_timestamp()) {
                (Some(start), Some(end)) => Value::number(days_between(&start, &end)),
                _ => Value::Null,
            }
        });

        let minimum = self.config.min_length_of_stay_days;
        let valid = with_los.filter(|r| r.value(LOS_DAYS).as_f64().is_some_and(|d| d > minimum));
        let invalid_stays = with_los.len() - valid.len();
        debug!("{} valid stays, {} invalid", valid.len(), invalid_stays);

        let stats = AggregationEngine::summarize(&valid, LOS_DAYS, [Stat::Mean, Stat::Median])?;
        let histogram = bucketize_field(&valid, LOS_DAYS, &self.config.los_bin_edges)?;

        Ok(LengthOfStayReport {
            summary: StaySummary {
                mean: stats.mean.unwrap_or(StatValue::NoData),
                median: stats.median.unwrap_or(StatValue::NoData),
                count_used: stats.valid_count,
            },
            histogram,
            invalid_stays,
            cleaning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Schema;
    use pretty_assertions::assert_eq;

    fn stays(rows: &[(&str, &str)]) -> Dataset {
        Dataset::from_rows(
            Schema::from_pairs([
                (ADMITTIME, FieldKind::Temporal),
                (DISCHTIME, FieldKind::Temporal),
            ]),
            rows.iter().map(|(a, d)| vec![Value::text(*a), Value::text(*d)]),
        )
    }

    #[test]
    fn test_summary_excludes_invalid_stays() {
        let data = stays(&[
            ("2024-01-01 00:00:00", "2024-01-02 00:00:00"), // 1.0
            ("2024-01-01 00:00:00", "2024-01-04 12:00:00"), // 3.5
            ("2024-01-01 00:00:00", "2024-01-01 00:00:00"), // 0, invalid
            ("2024-01-05 00:00:00", "2024-01-01 00:00:00"), // negative, invalid
            ("2024-01-01 00:00:00", "2024-01-03 00:00:00"), // 2.0
            ("garbage", "2024-01-03 00:00:00"),
        ]);
        let config = AnalysisConfig::default();
        let report = LengthOfStayAnalysis::new(&config).run(data).unwrap();

        assert_eq!(
            report.summary,
            StaySummary {
                mean: StatValue::Value((1.0 + 3.5 + 2.0) / 3.0),
                median: StatValue::Value(2.0),
                count_used: 3,
            }
        );
        assert_eq!(report.invalid_stays, 2);
        assert_eq!(report.cleaning.rows_dropped, 1);
    }

    #[test]
    fn test_histogram_uses_configured_edges() {
        let data = stays(&[
            ("2024-01-01 00:00:00", "2024-01-01 06:00:00"), // 0.25
            ("2024-01-01 00:00:00", "2024-01-02 00:00:00"), // 1.0
            ("2024-01-01 00:00:00", "2024-02-01 00:00:00"), // 31.0
        ]);
        let config = AnalysisConfig::default();
        let report = LengthOfStayAnalysis::new(&config).run(data).unwrap();

        assert_eq!(report.histogram.bins.len(), 14);
        assert_eq!(report.histogram.bins[0].count, 1);
        assert_eq!(report.histogram.bins[1].count, 1);
        assert_eq!(report.histogram.above, 1);
    }

    #[test]
    fn test_no_valid_stays_is_no_data() {
        let data = stays(&[("2024-01-01 00:00:00", "2024-01-01 00:00:00")]);
        let config = AnalysisConfig::default();
        let report = LengthOfStayAnalysis::new(&config).run(data).unwrap();
        assert_eq!(report.summary.mean, StatValue::NoData);
        assert_eq!(report.summary.count_used, 0);
    }
}
