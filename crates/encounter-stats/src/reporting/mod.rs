//! Report generation module.
//!
//! This module presents analysis results outside the engine:
//! - [`TableReport`] turns each result into polars DataFrames for display
//!   and CSV export
//! - [`AnalysisReport`] wraps a result with run metadata for JSON output
//! - [`ReportGenerator`] writes tables and reports into an output directory
//!
//! # Example
//!
//! ```rust,ignore
//! use encounter_stats::reporting::{AnalysisReport, ReportGenerator};
//!
//! let report = AnalysisReport::new("gender", vec!["patients.csv".into()], distribution);
//!
//! // Print as JSON
//! println!("{}", serde_json::to_string_pretty(&report)?);
//!
//! // Or export tables and the report
//! ReportGenerator::new(PathBuf::from("output")).export(&report)?;
//! ```

mod generator;
mod tables;

pub use generator::{AnalysisReport, ReportGenerator};
pub use tables::TableReport;
