//! Conversion of analysis results into polars DataFrames.
//!
//! Means and medians are rounded to two decimals here, at presentation
//! time; the analysis structs keep full precision.

use crate::analyses::{
    AdmissionsReport, AgeSummary, CategoryShare, GenderDistribution, LabStatistics,
    LengthOfStayReport, SplitAgeReport, TopDiagnoses, UniqueDiagnoses,
};
use crate::error::{Result, ResultExt};
use crate::types::StatValue;
use crate::utils::round_to;
use polars::prelude::*;

/// A result that can be presented as one or more named tables.
pub trait TableReport {
    /// Tables in display order, each with a file-safe name.
    fn tables(&self) -> Result<Vec<(&'static str, DataFrame)>>;
}

const DISPLAY_DECIMALS: u32 = 2;

fn rounded(stat: StatValue) -> Option<f64> {
    stat.value().map(|v| round_to(v, DISPLAY_DECIMALS))
}

fn share_table(label: &str, shares: &[CategoryShare]) -> Result<DataFrame> {
    let categories: Vec<&str> = shares.iter().map(|s| s.category.as_str()).collect();
    let counts: Vec<u64> = shares.iter().map(|s| s.count as u64).collect();
    let percents: Vec<Option<f64>> = shares.iter().map(|s| s.percent.value()).collect();
    df!(
        label => categories,
        "count" => counts,
        "percent" => percents,
    )
    .context(format!("Failed to build '{}' table", label))
}

impl TableReport for AdmissionsReport {
    fn tables(&self) -> Result<Vec<(&'static str, DataFrame)>> {
        Ok(vec![
            ("admissions_by_hour", share_table("hour", &self.hourly)?),
            ("admissions_by_day", share_table("day_of_week", &self.daily)?),
            (
                "discharge_destinations",
                share_table("discharge_location", &self.discharge_destinations)?,
            ),
        ])
    }
}

impl TableReport for LengthOfStayReport {
    fn tables(&self) -> Result<Vec<(&'static str, DataFrame)>> {
        let summary = df!(
            "average_days" => [rounded(self.summary.mean)],
            "median_days" => [rounded(self.summary.median)],
            "count_used" => [self.summary.count_used as u64],
            "invalid_stays" => [self.invalid_stays as u64],
        )
        .context("Failed to build length of stay summary")?;

        let bins = &self.histogram.bins;
        let histogram = df!(
            "lo" => bins.iter().map(|b| b.lo).collect::<Vec<_>>(),
            "hi" => bins.iter().map(|b| b.hi).collect::<Vec<_>>(),
            "admissions" => bins.iter().map(|b| b.count as u64).collect::<Vec<_>>(),
        )
        .context("Failed to build length of stay histogram")?;

        Ok(vec![("length_of_stay", summary), ("length_of_stay_histogram", histogram)])
    }
}

impl TableReport for TopDiagnoses {
    fn tables(&self) -> Result<Vec<(&'static str, DataFrame)>> {
        let e = &self.entries;
        let frame = df!(
            "rank" => e.iter().map(|d| d.rank as u64).collect::<Vec<_>>(),
            "icd_code" => e.iter().map(|d| d.icd_code.as_str()).collect::<Vec<_>>(),
            "icd_version" => e
                .iter()
                .map(|d| d.icd_version.as_f64().map(|v| v as i64))
                .collect::<Vec<_>>(),
            "long_title" => e.iter().map(|d| d.long_title.as_deref()).collect::<Vec<_>>(),
            "count" => e.iter().map(|d| d.count as u64).collect::<Vec<_>>(),
            "percent" => e.iter().map(|d| d.percent.value()).collect::<Vec<_>>(),
        )
        .context("Failed to build top diagnoses table")?;
        Ok(vec![("top_diagnoses", frame)])
    }
}

impl TableReport for UniqueDiagnoses {
    fn tables(&self) -> Result<Vec<(&'static str, DataFrame)>> {
        let p = &self.patients;
        let frame = df!(
            "subject_id" => p.iter().map(|d| d.subject_id.to_string()).collect::<Vec<_>>(),
            "icd_code" => p.iter().map(|d| d.icd_codes.join(", ")).collect::<Vec<_>>(),
            "unique_icd_count" => p.iter().map(|d| d.unique_icd_count as u64).collect::<Vec<_>>(),
        )
        .context("Failed to build unique diagnoses table")?;
        Ok(vec![("unique_icd_per_patient", frame)])
    }
}

impl TableReport for LabStatistics {
    fn tables(&self) -> Result<Vec<(&'static str, DataFrame)>> {
        let t = &self.tests;
        let frame = df!(
            "label" => t.iter().map(|s| s.label.as_deref()).collect::<Vec<_>>(),
            "events" => t.iter().map(|s| s.events as u64).collect::<Vec<_>>(),
            "mean_value" => t.iter().map(|s| rounded(s.mean_value)).collect::<Vec<_>>(),
            "missing_percent" => t.iter().map(|s| s.missing_percent.value()).collect::<Vec<_>>(),
        )
        .context("Failed to build lab statistics table")?;
        Ok(vec![("lab_statistics", frame)])
    }
}

impl TableReport for GenderDistribution {
    fn tables(&self) -> Result<Vec<(&'static str, DataFrame)>> {
        Ok(vec![("gender_distribution", share_table("gender", &self.genders)?)])
    }
}

impl TableReport for AgeSummary {
    fn tables(&self) -> Result<Vec<(&'static str, DataFrame)>> {
        let frame = df!(
            "average_age" => [rounded(self.mean)],
            "median_age" => [rounded(self.median)],
            "count_used" => [self.count_used as u64],
        )
        .context("Failed to build age table")?;
        Ok(vec![("age_statistics", frame)])
    }
}

impl TableReport for SplitAgeReport {
    fn tables(&self) -> Result<Vec<(&'static str, DataFrame)>> {
        let p = &self.partitions;
        let mut partitions: Vec<String> = p
            .iter()
            .map(|a| format!("patients_{}", a.partition))
            .collect();
        let mut patients: Vec<u64> = p.iter().map(|a| a.patients as u64).collect();
        let mut means: Vec<Option<f64>> = p.iter().map(|a| rounded(a.mean_age)).collect();

        partitions.push("overall".to_string());
        patients.push(patients.iter().sum());
        means.push(rounded(self.overall_mean_age));

        let frame = df!(
            "partition" => partitions,
            "patients" => patients,
            "mean_age" => means,
        )
        .context("Failed to build split age table")?;
        Ok(vec![("split_age_analysis", frame)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyses::PartitionAge;

    #[test]
    fn test_share_table_columns() {
        let shares = vec![
            CategoryShare {
                category: "HOME".to_string(),
                count: 2,
                percent: StatValue::Value(66.67),
            },
            CategoryShare {
                category: "UNKNOWN".to_string(),
                count: 1,
                percent: StatValue::Value(33.33),
            },
        ];
        let frame = share_table("discharge_location", &shares).unwrap();
        assert_eq!(frame.shape(), (2, 3));
        let names: Vec<&str> = frame.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["discharge_location", "count", "percent"]);
    }

    #[test]
    fn test_split_age_table_appends_overall_row() {
        let report = SplitAgeReport {
            partitions: vec![
                PartitionAge {
                    partition: 1,
                    patients: 3,
                    mean_age: StatValue::Value(10.0),
                },
                PartitionAge {
                    partition: 2,
                    patients: 1,
                    mean_age: StatValue::Value(20.0),
                },
            ],
            overall_mean_age: StatValue::Value(12.5),
        };
        let tables = report.tables().unwrap();
        let frame = &tables[0].1;
        assert_eq!(frame.height(), 3);
        let means = frame.column("mean_age").unwrap().as_materialized_series().f64().unwrap();
        assert_eq!(means.get(2), Some(12.5));
        let patients = frame.column("patients").unwrap().as_materialized_series().u64().unwrap();
        assert_eq!(patients.get(2), Some(4));
    }
}
