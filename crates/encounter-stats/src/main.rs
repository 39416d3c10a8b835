//! CLI entry point for the clinical encounter analyses.

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use encounter_stats::{
    AdmissionsAnalysis, AnalysisConfig, AnalysisReport, Dataset, DiagnosisAnalysis, LabAnalysis,
    LengthOfStayAnalysis, PatientAnalysis, ReportGenerator, TableReport,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Aggregate statistics over clinical encounter tables",
    long_about = "Summarizes admissions, diagnoses, lab events and patient demographics \
                  into grouped counts, percentages and central-tendency statistics.\n\n\
                  EXAMPLES:\n  \
                  # Peak admission hours and weekdays\n  \
                  encounter-stats admissions -i admissions.csv\n\n  \
                  # Top 5 diagnoses with descriptions, exported to results/\n  \
                  encounter-stats --top-n 5 -o results/ top-diagnoses -i diagnoses_icd.csv \
                  --dictionary d_icd_diagnoses.csv\n\n  \
                  # Split age analysis as JSON\n  \
                  encounter-stats --json --partitions 4 split-ages -i patients.csv"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON file with analysis settings
    ///
    /// Fields not present in the file keep their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Number of entries kept by top-N rankings (overrides the config file)
    #[arg(long, global = true)]
    top_n: Option<usize>,

    /// Number of partitions for the split age analysis (overrides the config file)
    #[arg(long, global = true)]
    partitions: Option<usize>,

    /// Output directory for CSV tables and the JSON report
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Output JSON to stdout instead of tables
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and the result)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Admissions per hour of day and weekday, plus discharge destinations
    Admissions {
        /// Admissions table (admittime, discharge_location)
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Length of stay summary and histogram
    LengthOfStay {
        /// Admissions table (admittime, dischtime)
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Most frequent diagnosis codes
    TopDiagnoses {
        /// Diagnoses table (icd_code, icd_version)
        #[arg(short, long)]
        input: PathBuf,

        /// Diagnosis dictionary (icd_code, icd_version, long_title)
        #[arg(short, long)]
        dictionary: Option<PathBuf>,
    },
    /// Unique diagnosis codes per patient
    UniqueDiagnoses {
        /// Diagnoses table (subject_id, icd_code)
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Mean value and missing percent per lab test
    Labs {
        /// Lab events table (itemid, value)
        #[arg(long)]
        labevents: PathBuf,

        /// Lab item dictionary (itemid, label)
        #[arg(long)]
        labitems: PathBuf,
    },
    /// Patients per gender
    Gender {
        /// Patients table (gender)
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Mean and median patient age
    Ages {
        /// Patients table (anchor_age)
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Mean age per partition and the recombined overall mean
    ///
    /// With --output, each partition is also written as patients_<i>.csv
    SplitAges {
        /// Patients table (subject_id, anchor_age)
        #[arg(short, long)]
        input: PathBuf,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only carries
/// the JSON report.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    let config = load_config(&args)?;
    debug!("Using configuration: {:?}", config);

    match &args.command {
        Command::Admissions { input } => {
            let result = AdmissionsAnalysis::new(&config).run(load_csv(input)?)?;
            if let Some(peak) = result.peak_hour() {
                info!("Peak admission hour: {} ({} admissions)", peak.category, peak.count);
            }
            emit(&args, "admissions", &[input], result)
        }
        Command::LengthOfStay { input } => {
            let result = LengthOfStayAnalysis::new(&config).run(load_csv(input)?)?;
            emit(&args, "length_of_stay", &[input], result)
        }
        Command::TopDiagnoses { input, dictionary } => {
            let diagnoses = load_csv(input)?;
            let descriptions = dictionary.as_deref().map(load_csv).transpose()?;
            let result = DiagnosisAnalysis::new(&config).top_diagnoses(diagnoses, descriptions)?;

            let inputs: Vec<&Path> = std::iter::once(input.as_path())
                .chain(dictionary.as_deref())
                .collect();
            emit(&args, "top_diagnoses", inputs.as_slice(), result)
        }
        Command::UniqueDiagnoses { input } => {
            let result = DiagnosisAnalysis::new(&config).unique_per_patient(load_csv(input)?)?;
            emit(&args, "unique_diagnoses", &[input], result)
        }
        Command::Labs {
            labevents,
            labitems,
        } => {
            let result = LabAnalysis.run(load_csv(labevents)?, load_csv(labitems)?)?;
            emit(&args, "lab_statistics", &[labevents, labitems], result)
        }
        Command::Gender { input } => {
            let result = PatientAnalysis::new(&config).gender_distribution(load_csv(input)?)?;
            emit(&args, "gender", &[input], result)
        }
        Command::Ages { input } => {
            let result = PatientAnalysis::new(&config).age_statistics(load_csv(input)?)?;
            emit(&args, "ages", &[input], result)
        }
        Command::SplitAges { input } => {
            let analysis = PatientAnalysis::new(&config);
            let patients = analysis.prepare_split(load_csv(input)?)?;
            if let Some(dir) = &args.output {
                let parts = analysis.split_files(&patients)?;
                let written =
                    ReportGenerator::new(dir.clone()).write_partitions("patients", &parts)?;
                info!("Split files saved: {}", written.len());
            }
            let result = analysis.split_ages(&patients)?;
            emit(&args, "split_ages", &[input], result)
        }
    }
}

/// Read the config file if given, then apply command-line overrides.
fn load_config(args: &Args) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let content = fs::read_to_string(path)
                .map_err(|e| anyhow!("Could not read config file {}: {}", path.display(), e))?;
            let config: AnalysisConfig = serde_json::from_str(&content)?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        None => AnalysisConfig::default(),
    };

    if let Some(n) = args.top_n {
        config.top_n = n;
    }
    if let Some(k) = args.partitions {
        config.partition_count = k;
    }

    config.validate()?;
    Ok(config)
}

/// Load a CSV file into a dataset.
///
/// Every column is read as text so codes keep their leading zeros; the
/// analyses coerce numeric fields through their cleaning rules.
fn load_csv(path: &Path) -> Result<Dataset> {
    if !path.exists() {
        return Err(anyhow!("Input file not found: {}", path.display()));
    }

    info!("Loading dataset from: {}", path.display());
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(0))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    info!("Dataset loaded successfully: {:?}", df.shape());

    Ok(Dataset::from_dataframe(&df)?)
}

/// Print the result and optionally export it.
fn emit<T, P>(args: &Args, analysis: &str, inputs: &[P], result: T) -> Result<()>
where
    T: Serialize + TableReport,
    P: AsRef<Path>,
{
    let inputs = inputs
        .iter()
        .map(|p| p.as_ref().display().to_string())
        .collect();
    let report = AnalysisReport::new(analysis, inputs, result);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for (name, frame) in report.result.tables()? {
            println!("\n{}:\n{}", name, frame);
        }
    }

    if let Some(dir) = &args.output {
        let written = ReportGenerator::new(dir.clone()).export(&report)?;
        info!("Exported {} files to {}", written.len(), dir.display());
    }

    Ok(())
}
