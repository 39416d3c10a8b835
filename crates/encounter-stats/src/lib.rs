//! Relational Aggregation Engine for Clinical Encounter Data
//!
//! A grouped-aggregation library built with Rust and Polars that summarizes
//! admissions, lab results, diagnosis codes and patient demographics into
//! counts, percentages, central-tendency statistics and ranked top-N tables.
//!
//! # Overview
//!
//! The engine is a chain of small, pure stages:
//!
//! - **Schema Validation**: required fields must be declared before anything runs
//! - **Cleaning/Coercion**: timestamps, numeric text and missing markers become typed values
//! - **Reference Joins**: left joins against dictionary tables, first-seen de-duplication
//! - **Grouped Aggregation**: count, percent, mean, median and missing rate per group
//! - **Top-N Ranking**: deterministic ordering with share of total
//! - **Histograms**: half-open bins with out-of-range accounting
//! - **Partitioning**: per-shard aggregation on scoped threads, weighted recombination
//!
//! The [`analyses`] module builds the clinical reports on top of these stages
//! and [`reporting`] turns them into polars DataFrames and JSON.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use encounter_stats::{AggregationEngine, AggregationSpec, CategoryOrder, Dataset, Stat};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .try_into_reader_with_file_path(Some("admissions.csv".into()))?
//!     .finish()?;
//! let admissions = Dataset::from_dataframe(&df)?;
//!
//! let spec = AggregationSpec::new()
//!     .group_by(["hour"])
//!     .stats([Stat::Percent])
//!     .order_by(CategoryOrder::hours("hour"));
//! let hourly = AggregationEngine::aggregate(&admissions, &spec)?;
//! ```
//!
//! # Analyses
//!
//! ```rust,ignore
//! use encounter_stats::{AnalysisConfig, PatientAnalysis};
//!
//! let config = AnalysisConfig::builder()
//!     .partition_count(4)
//!     .build()?;
//!
//! let report = PatientAnalysis::new(&config).split_age_analysis(patients)?;
//! println!("Overall mean age: {:?}", report.overall_mean_age);
//! ```

pub mod aggregation;
pub mod analyses;
pub mod cleaner;
pub mod config;
pub mod dataset;
pub mod error;
pub mod histogram;
pub mod join;
pub mod partition;
pub mod ranking;
pub mod reporting;
pub mod types;
pub mod utils;
pub mod validator;

// Re-exports for convenient access
pub use aggregation::{AggregationEngine, AggregationSpec, CategoryOrder, GroupValues, Stat};
pub use analyses::{
    AdmissionsAnalysis, AdmissionsReport, AgeSummary, CategoryShare, DiagnosisAnalysis,
    GenderDistribution, LabAnalysis, LabStatistics, LengthOfStayAnalysis, LengthOfStayReport,
    PatientAnalysis, SplitAgeReport, TopDiagnoses, UniqueDiagnoses,
};
pub use cleaner::{CleaningReport, CoercionRule, CoercionRules, CoercionWarning, DataCleaner};
pub use config::{AgeCap, AnalysisConfig, AnalysisConfigBuilder, ConfigValidationError};
pub use dataset::{Dataset, FieldKind, FieldSpec, Record, Schema, Tabular, Value};
pub use error::{AggregationError, JoinSide, Result as AggregationResult, ResultExt, Stage};
pub use histogram::{bucketize, bucketize_field};
pub use join::{JoinSummary, ReferenceJoiner};
pub use partition::{Partition, PartitionedAggregation, PartitionedResult, Recombiner, partition};
pub use ranking::TopNRanker;
pub use reporting::{AnalysisReport, ReportGenerator, TableReport};
pub use types::{GroupAggregate, GroupKey, Histogram, HistogramBin, RankedEntry, StatValue};
pub use utils::{PERCENT_PRECISION, percent_of, round_to};
pub use validator::SchemaValidator;
