//! Patient demographics: gender distribution and age statistics.

use super::{CategoryShare, prepare};
use crate::aggregation::{AggregationEngine, AggregationSpec, Stat};
use crate::cleaner::{CleaningReport, CoercionRule, CoercionRules};
use crate::config::AnalysisConfig;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::partition::{Partition, PartitionedAggregation, partition};
use crate::ranking::TopNRanker;
use crate::types::StatValue;
use serde::Serialize;
use tracing::info;

const GENDER: &str = "gender";
const ANCHOR_AGE: &str = "anchor_age";
const SUBJECT_ID: &str = "subject_id";

#[derive(Debug, Clone, Serialize)]
pub struct GenderDistribution {
    /// Genders by count, descending.
    pub genders: Vec<CategoryShare>,
    pub total_patients: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeSummary {
    pub mean: StatValue,
    pub median: StatValue,
    /// Patients with a numeric age.
    pub count_used: usize,
    pub cleaning: CleaningReport,
}

/// Age statistics of one partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionAge {
    /// 1-based partition number.
    pub partition: usize,
    pub patients: usize,
    pub mean_age: StatValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitAgeReport {
    pub partitions: Vec<PartitionAge>,
    /// Mean over all patients, recombined from the partition means weighted by their counts.
    pub overall_mean_age: StatValue,
}

pub struct PatientAnalysis<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> PatientAnalysis<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Patients per gender; missing genders are counted under the missing marker.
    pub fn gender_distribution(&self, patients: Dataset) -> Result<GenderDistribution> {
        info!("Computing gender distribution...");
        let rules = CoercionRules::new().rule(
            GENDER,
            CoercionRule::NormalizeCategory {
                missing_marker: self.config.missing_marker.clone(),
            },
        );
        let (data, _) = prepare(patients, &[GENDER], &rules)?;

        let groups =
            AggregationEngine::aggregate(&data, &AggregationSpec::new().group_by([GENDER]))?;
        let ranked = TopNRanker::top_n(&groups, groups.len(), Stat::Count)?;

        Ok(GenderDistribution {
            genders: ranked.iter().map(CategoryShare::from_ranked).collect(),
            total_patients: data.len(),
        })
    }

    /// Mean and median of `anchor_age` after the configured age cap.
    pub fn age_statistics(&self, patients: Dataset) -> Result<AgeSummary> {
        info!("Computing age statistics...");
        let rules = CoercionRules::new().rule(ANCHOR_AGE, self.config.age_cap.rule());
        let (data, cleaning) = prepare(patients, &[ANCHOR_AGE], &rules)?;

        let summary = AggregationEngine::summarize(&data, ANCHOR_AGE, [Stat::Mean, Stat::Median])?;
        Ok(AgeSummary {
            mean: summary.mean.unwrap_or(StatValue::NoData),
            median: summary.median.unwrap_or(StatValue::NoData),
            count_used: summary.valid_count,
            cleaning,
        })
    }

    /// Split patients into the configured number of partitions and report
    /// each partition's mean age alongside the weighted overall mean.
    ///
    /// Ages are taken as recorded, without the age cap.
    pub fn split_age_analysis(&self, patients: Dataset) -> Result<SplitAgeReport> {
        let patients = self.prepare_split(patients)?;
        self.split_ages(&patients)
    }

    /// Validate `subject_id` and `anchor_age` and coerce ages to numbers.
    ///
    /// The result is what [`split_ages`](Self::split_ages) and
    /// [`split_files`](Self::split_files) partition.
    pub fn prepare_split(&self, patients: Dataset) -> Result<Dataset> {
        let rules = CoercionRules::new().rule(ANCHOR_AGE, CoercionRule::ParseNumeric);
        let (data, _) = prepare(patients, &[SUBJECT_ID, ANCHOR_AGE], &rules)?;
        Ok(data)
    }

    /// The configured partitions of already prepared patients.
    pub fn split_files<'d>(&self, patients: &'d Dataset) -> Result<Vec<Partition<'d>>> {
        partition(patients, self.config.partition_count)
    }

    /// Per-partition and overall mean age of already prepared patients.
    pub fn split_ages(&self, patients: &Dataset) -> Result<SplitAgeReport> {
        info!(
            "Running split age analysis over {} partitions...",
            self.config.partition_count
        );
        let spec = AggregationSpec::new().measure(ANCHOR_AGE).stats([Stat::Mean]);
        let result = PartitionedAggregation::run(patients, &spec, self.config.partition_count)?;

        let partitions = result
            .per_partition
            .iter()
            .enumerate()
            .map(|(i, groups)| {
                let group = groups.first();
                PartitionAge {
                    partition: i + 1,
                    patients: group.map_or(0, |g| g.count),
                    mean_age: group.and_then(|g| g.mean).unwrap_or(StatValue::NoData),
                }
            })
            .collect();

        let overall_mean_age = result
            .combined
            .first()
            .and_then(|g| g.mean)
            .unwrap_or(StatValue::NoData);

        Ok(SplitAgeReport {
            partitions,
            overall_mean_age,
        })
    }
}
