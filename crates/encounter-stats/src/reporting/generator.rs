use super::TableReport;
use crate::dataset::to_dataframe;
use crate::error::Result;
use crate::partition::Partition;
use chrono::Local;
use polars::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

// ============================================================================
// Report Envelope
// ============================================================================

/// An analysis result wrapped with run metadata.
///
/// Used for both JSON output to stdout (`--json`) and the report file
/// written next to exported tables.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport<T: Serialize> {
    /// Timestamp when the report was generated
    pub generated_at: String,
    /// Name of the analysis that produced `result`
    pub analysis: String,
    /// Input files the analysis read
    pub inputs: Vec<String>,
    pub result: T,
}

impl<T: Serialize> AnalysisReport<T> {
    pub fn new(analysis: impl Into<String>, inputs: Vec<String>, result: T) -> Self {
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            analysis: analysis.into(),
            inputs,
            result,
        }
    }
}

// ============================================================================
// Report Generator
// ============================================================================

/// Writes result tables as CSV and reports as JSON into an output directory.
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new(PathBuf::from("output"))
    }
}

impl ReportGenerator {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    /// Write one table to `<output_dir>/<name>.csv`.
    pub fn write_table(&self, name: &str, frame: &mut DataFrame) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}.csv", name));
        let mut file = File::create(&path)?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .with_quote_char(b'"')
            .finish(frame)?;

        info!("Table saved: {}", path.display());
        Ok(path)
    }

    /// Write each partition's records to `<output_dir>/<base_name>_<i>.csv`, 1-based.
    pub fn write_partitions(
        &self,
        base_name: &str,
        parts: &[Partition<'_>],
    ) -> Result<Vec<PathBuf>> {
        parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                let mut frame = to_dataframe(part)?;
                self.write_table(&format!("{}_{}", base_name, i + 1), &mut frame)
            })
            .collect()
    }

    /// Write a report to `<output_dir>/<base_name>_report.json`.
    pub fn write_report<T: Serialize>(
        &self,
        report: &AnalysisReport<T>,
        base_name: &str,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join(format!("{}_report.json", base_name));
        let mut file = File::create(&path)?;
        file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;

        info!("Report saved: {}", path.display());
        Ok(path)
    }

    /// Write every table of the report's result plus the JSON report itself.
    pub fn export<T: Serialize + TableReport>(
        &self,
        report: &AnalysisReport<T>,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for (name, mut frame) in report.result.tables()? {
            written.push(self.write_table(name, &mut frame)?);
        }
        written.push(self.write_report(report, &report.analysis)?);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyses::{AgeSummary, CategoryShare, GenderDistribution};
    use crate::cleaner::CleaningReport;
    use crate::dataset::{Dataset, FieldKind, Schema, Value};
    use crate::partition::partition;
    use crate::types::StatValue;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "encounter-stats-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_export_writes_tables_and_report() {
        let dir = temp_dir("export");
        let generator = ReportGenerator::new(dir.clone());
        let result = GenderDistribution {
            genders: vec![CategoryShare {
                category: "F".to_string(),
                count: 3,
                percent: StatValue::Value(100.0),
            }],
            total_patients: 3,
        };
        let report = AnalysisReport::new("gender", vec!["patients.csv".to_string()], result);

        let written = generator.export(&report).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir.join("gender_distribution.csv").exists());

        let csv = fs::read_to_string(dir.join("gender_distribution.csv")).unwrap();
        assert!(csv.starts_with("gender,count,percent"));
        assert!(csv.contains("F,3,100.0"));

        let report_json = fs::read_to_string(dir.join("gender_report.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&report_json).unwrap();
        assert_eq!(json["analysis"], "gender");
        assert_eq!(json["result"]["genders"][0]["count"], 3);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_partitions_numbers_files_from_one() {
        let dir = temp_dir("partitions");
        let data = Dataset::from_rows(
            Schema::from_pairs([
                ("subject_id", FieldKind::Identifier),
                ("anchor_age", FieldKind::Numeric),
            ]),
            vec![
                vec![Value::text("10001"), Value::number(52.0)],
                vec![Value::text("10002"), Value::number(89.0)],
                vec![Value::text("10003"), Value::number(40.0)],
            ],
        );
        let parts = partition(&data, 2).unwrap();

        let written = ReportGenerator::new(dir.clone())
            .write_partitions("patients", &parts)
            .unwrap();
        assert_eq!(written, vec![dir.join("patients_1.csv"), dir.join("patients_2.csv")]);

        let first = fs::read_to_string(dir.join("patients_1.csv")).unwrap();
        assert_eq!(first, "subject_id,anchor_age\n10001,52\n10002,89\n");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_no_data_serializes_as_null() {
        let result = AgeSummary {
            mean: StatValue::NoData,
            median: StatValue::NoData,
            count_used: 0,
            cleaning: CleaningReport::default(),
        };
        let report = AnalysisReport::new("ages", vec![], result);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["result"]["mean"].is_null());
        assert_eq!(json["result"]["count_used"], 0);
    }
}
