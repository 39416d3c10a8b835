use super::{CategoryShare, prepare};
use crate::aggregation::temporal::{hour_of, weekday_name};
use crate::aggregation::{AggregationEngine, AggregationSpec, CategoryOrder, Stat};
use crate::cleaner::{CleaningReport, CoercionRule, CoercionRules};
use crate::config::AnalysisConfig;
use crate::dataset::{Dataset, FieldKind, Value};
use crate::error::Result;
use crate::ranking::TopNRanker;
use serde::Serialize;
use tracing::info;

const ADMITTIME: &str = "admittime";
const DISCHARGE_LOCATION: &str = "discharge_location";
const HOUR: &str = "hour";
const DAY_OF_WEEK: &str = "day_of_week";

/// Admission volume by hour and weekday, plus discharge destinations.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionsReport {
    /// Admissions per hour of day, in hour order.
    pub hourly: Vec<CategoryShare>,
    /// Admissions per weekday, Monday first.
    pub daily: Vec<CategoryShare>,
    /// Discharge destinations by count, descending.
    pub discharge_destinations: Vec<CategoryShare>,
    pub cleaning: CleaningReport,
}

impl AdmissionsReport {
    /// The busiest hour, if any admissions were counted.
    pub fn peak_hour(&self) -> Option<&CategoryShare> {
        peak(&self.hourly)
    }

    pub fn peak_day(&self) -> Option<&CategoryShare> {
        peak(&self.daily)
    }
}

/// First entry with the highest count.
fn peak(shares: &[CategoryShare]) -> Option<&CategoryShare> {
    shares
        .iter()
        .reduce(|best, s| if s.count > best.count { s } else { best })
}

/// Peak admission times and discharge destinations over `admissions.csv`.
pub struct AdmissionsAnalysis<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> AdmissionsAnalysis<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Requires `admittime` and `discharge_location`.
    ///
    /// Admissions with an unparsable `admittime` are dropped before either
    /// summary is computed.
    pub fn run(&self, admissions: Dataset) -> Result<AdmissionsReport> {
        info!("Analyzing admissions...");
        let rules = CoercionRules::new()
            .rule(ADMITTIME, CoercionRule::ParseTemporal)
            .rule(
                DISCHARGE_LOCATION,
                CoercionRule::NormalizeCategory {
                    missing_marker: self.config.missing_marker.clone(),
                },
            );
        let (data, cleaning) = prepare(admissions, &[ADMITTIME, DISCHARGE_LOCATION], &rules)?;

        let data = data
            .with_derived_field(HOUR, FieldKind::Numeric, |r| {
                r.value(ADMITTIME)
                    .as_timestamp()
                    .map(|ts| f64::from(hour_of(&ts)))
                    .into()
            })
            .with_derived_field(DAY_OF_WEEK, FieldKind::Categorical, |r| {
                r.value(ADMITTIME)
                    .as_timestamp()
                    .map_or(Value::Null, |ts| Value::text(weekday_name(&ts)))
            });

        let hourly = AggregationEngine::aggregate(
            &data,
            &AggregationSpec::new()
                .group_by([HOUR])
                .stats([Stat::Percent])
                .order_by(CategoryOrder::hours(HOUR)),
        )?;
        let daily = AggregationEngine::aggregate(
            &data,
            &AggregationSpec::new()
                .group_by([DAY_OF_WEEK])
                .stats([Stat::Percent])
                .order_by(CategoryOrder::weekdays(DAY_OF_WEEK)),
        )?;

        let destinations = AggregationEngine::aggregate(
            &data,
            &AggregationSpec::new().group_by([DISCHARGE_LOCATION]),
        )?;
        let ranked = TopNRanker::top_n(&destinations, destinations.len(), Stat::Count)?;

        Ok(AdmissionsReport {
            hourly: hourly.iter().map(CategoryShare::from_aggregate).collect(),
            daily: daily.iter().map(CategoryShare::from_aggregate).collect(),
            discharge_destinations: ranked.iter().map(CategoryShare::from_ranked).collect(),
            cleaning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Schema;
    use crate::types::StatValue;
    use pretty_assertions::assert_eq;

    fn admissions(rows: &[(&str, Option<&str>)]) -> Dataset {
        Dataset::from_rows(
            Schema::from_pairs([
                (ADMITTIME, FieldKind::Categorical),
                (DISCHARGE_LOCATION, FieldKind::Categorical),
            ]),
            rows.iter()
                .map(|(t, d)| vec![Value::text(*t), Value::from(*d)]),
        )
    }

    #[test]
    fn test_hourly_counts() {
        let data = admissions(&[
            ("2024-01-01 00:10:00", Some("HOME")),
            ("2024-01-02 00:55:00", Some("HOME")),
            ("2024-01-03 13:00:00", Some("SNF")),
            ("2024-01-04 13:30:00", None),
        ]);
        let config = AnalysisConfig::default();
        let report = AdmissionsAnalysis::new(&config).run(data).unwrap();

        let hours: Vec<(&str, usize, StatValue)> = report
            .hourly
            .iter()
            .map(|s| (s.category.as_str(), s.count, s.percent))
            .collect();
        assert_eq!(
            hours,
            vec![("0", 2, StatValue::Value(50.0)), ("13", 2, StatValue::Value(50.0))]
        );
    }

    #[test]
    fn test_daily_in_calendar_order_and_destinations() {
        let data = admissions(&[
            ("2024-01-07 08:00:00", Some("HOME")), // Sunday
            ("2024-01-03 08:00:00", Some("HOME")), // Wednesday
            ("2024-01-01 08:00:00", None),         // Monday
            ("bad timestamp", Some("SNF")),
        ]);
        let config = AnalysisConfig::default();
        let report = AdmissionsAnalysis::new(&config).run(data).unwrap();

        let days: Vec<&str> = report.daily.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(days, vec!["Monday", "Wednesday", "Sunday"]);
        assert_eq!(report.cleaning.rows_dropped, 1);

        let destinations: Vec<(&str, usize)> = report
            .discharge_destinations
            .iter()
            .map(|s| (s.category.as_str(), s.count))
            .collect();
        assert_eq!(destinations, vec![("HOME", 2), ("UNKNOWN", 1)]);
        assert_eq!(report.discharge_destinations[0].percent, StatValue::Value(66.67));
        assert_eq!(report.peak_day().map(|s| s.category.as_str()), Some("Monday"));
    }

    #[test]
    fn test_missing_field_is_schema_error() {
        let data = Dataset::from_rows(
            Schema::from_pairs([(ADMITTIME, FieldKind::Categorical)]),
            Vec::<Vec<Value>>::new(),
        );
        let config = AnalysisConfig::default();
        let err = AdmissionsAnalysis::new(&config).run(data).unwrap_err();
        assert_eq!(err.missing_fields(), [DISCHARGE_LOCATION]);
    }
}
