//! Diagnosis code frequency and per-patient code listings.

use super::{code_text, prepare};
use crate::aggregation::{AggregationEngine, AggregationSpec, Stat, statistics};
use crate::cleaner::{CleaningReport, CoercionRule, CoercionRules};
use crate::config::AnalysisConfig;
use crate::dataset::{Dataset, FieldKind, Record, Schema, Value};
use crate::error::Result;
use crate::join::ReferenceJoiner;
use crate::ranking::TopNRanker;
use crate::types::StatValue;
use crate::validator::SchemaValidator;
use serde::Serialize;
use tracing::{info, warn};

const ICD_CODE: &str = "icd_code";
const ICD_VERSION: &str = "icd_version";
const LONG_TITLE: &str = "long_title";
const SUBJECT_ID: &str = "subject_id";
const COUNT: &str = "count";

/// One ranked diagnosis code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisEntry {
    pub rank: usize,
    pub icd_code: String,
    pub icd_version: Value,
    /// Dictionary description; `None` when the dictionary has no row for the code.
    pub long_title: Option<String>,
    pub count: usize,
    /// Share of all diagnoses, not just the ranked ones.
    pub percent: StatValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopDiagnoses {
    pub entries: Vec<DiagnosisEntry>,
    /// Diagnoses with both a code and a version.
    pub total_diagnoses: usize,
    pub cleaning: CleaningReport,
}

/// The unique codes recorded for one patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientDiagnoses {
    pub subject_id: Value,
    /// Codes in first-seen order.
    pub icd_codes: Vec<String>,
    pub unique_icd_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UniqueDiagnoses {
    pub patients: Vec<PatientDiagnoses>,
    pub average_unique_count: StatValue,
}

pub struct DiagnosisAnalysis<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> DiagnosisAnalysis<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Top diagnoses by `(icd_code, icd_version)`, described from `dictionary` when given.
    ///
    /// Codes are trimmed and versions coerced to numbers; rows missing either
    /// are dropped before counting. The dictionary needs `icd_code`,
    /// `icd_version` and `long_title`; its first row per code wins.
    pub fn top_diagnoses(
        &self,
        diagnoses: Dataset,
        dictionary: Option<Dataset>,
    ) -> Result<TopDiagnoses> {
        info!("Ranking top {} diagnoses...", self.config.top_n);
        let (diagnoses, cleaning) = clean_codes(diagnoses, &[ICD_CODE, ICD_VERSION])?;
        let diagnoses = diagnoses.drop_nulls(&[ICD_CODE, ICD_VERSION]);

        let groups = AggregationEngine::aggregate(
            &diagnoses,
            &AggregationSpec::new().group_by([ICD_CODE, ICD_VERSION]),
        )?;
        let ranked = TopNRanker::top_n(&groups, self.config.top_n, Stat::Count)?;

        // the ranked codes as a small table so descriptions come from a left join
        let top = Dataset::new(
            Schema::from_pairs([
                (ICD_CODE, FieldKind::Coded),
                (ICD_VERSION, FieldKind::Numeric),
                (COUNT, FieldKind::Numeric),
            ]),
            ranked
                .iter()
                .map(|entry| {
                    let key = entry.aggregate.key.values();
                    Record::new()
                        .with(ICD_CODE, key[0].clone())
                        .with(ICD_VERSION, key[1].clone())
                        .with(COUNT, entry.aggregate.count as f64)
                })
                .collect(),
        );

        let described = match dictionary {
            Some(dictionary) => {
                let (dictionary, _) =
                    clean_codes(dictionary, &[ICD_CODE, ICD_VERSION, LONG_TITLE])?;
                let dictionary = dictionary
                    .with_derived_field(LONG_TITLE, FieldKind::Categorical, |r| {
                        code_text(r.value(LONG_TITLE))
                    })
                    .drop_nulls(&[ICD_CODE, ICD_VERSION]);
                ReferenceJoiner::left_join(&top, &dictionary, &[ICD_CODE, ICD_VERSION])?
            }
            None => {
                warn!("No diagnosis dictionary given; descriptions are left empty");
                top
            }
        };

        let entries = ranked
            .iter()
            .zip(described.records())
            .map(|(entry, record)| DiagnosisEntry {
                rank: entry.rank,
                icd_code: record.value(ICD_CODE).to_string(),
                icd_version: record.value(ICD_VERSION).clone(),
                long_title: record.value(LONG_TITLE).as_str().map(str::to_string),
                count: entry.aggregate.count,
                percent: entry.percent_of_total,
            })
            .collect();

        Ok(TopDiagnoses {
            entries,
            total_diagnoses: diagnoses.len(),
            cleaning,
        })
    }

    /// Unique codes per `subject_id`, plus the average unique count per patient.
    pub fn unique_per_patient(&self, diagnoses: Dataset) -> Result<UniqueDiagnoses> {
        info!("Collecting unique diagnosis codes per patient...");
        let diagnoses = SchemaValidator::validate(diagnoses, &[SUBJECT_ID, ICD_CODE])?
            .with_derived_field(ICD_CODE, FieldKind::Coded, |r| code_text(r.value(ICD_CODE)))
            .drop_nulls(&[SUBJECT_ID]);

        let groups = AggregationEngine::distinct_values(&diagnoses, &[SUBJECT_ID], ICD_CODE)?;
        let patients: Vec<PatientDiagnoses> = groups
            .into_iter()
            .map(|group| PatientDiagnoses {
                subject_id: group.key.get(0).cloned().unwrap_or_default(),
                unique_icd_count: group.unique_count(),
                icd_codes: group.values.iter().map(ToString::to_string).collect(),
            })
            .collect();

        let counts: Vec<f64> = patients.iter().map(|p| p.unique_icd_count as f64).collect();
        Ok(UniqueDiagnoses {
            average_unique_count: StatValue::from_option(statistics::mean(&counts)),
            patients,
        })
    }
}

/// Validate `required`, trim codes and coerce versions.
fn clean_codes(data: Dataset, required: &[&str]) -> Result<(Dataset, CleaningReport)> {
    let rules = CoercionRules::new().rule(ICD_VERSION, CoercionRule::ParseNumeric);
    let (data, report) = prepare(data, required, &rules)?;
    let data =
        data.with_derived_field(ICD_CODE, FieldKind::Coded, |r| code_text(r.value(ICD_CODE)));
    Ok((data, report))
}
