//! Custom error types for the aggregation engine.
//!
//! Fatal conditions (missing schema fields, bad join keys, invalid
//! configuration) abort the current stage and surface here. Non-fatal
//! coercion failures are never errors: they are counted in
//! [`CleaningReport`](crate::cleaner::CleaningReport) instead.
//!
//! Errors serialize as `{code, message}` so reports can embed them.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::fmt;
use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    Cleaning,
    Join,
    Aggregation,
    Ranking,
    Histogram,
    Partition,
    Recombination,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validation => "validation",
            Stage::Cleaning => "cleaning",
            Stage::Join => "join",
            Stage::Aggregation => "aggregation",
            Stage::Ranking => "ranking",
            Stage::Histogram => "histogram",
            Stage::Partition => "partition",
            Stage::Recombination => "recombination",
        };
        f.write_str(name)
    }
}

/// Which side of a join a key problem was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinSide {
    Primary,
    Reference,
}

impl fmt::Display for JoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinSide::Primary => f.write_str("primary"),
            JoinSide::Reference => f.write_str("reference"),
        }
    }
}

/// The main error type for the aggregation engine.
#[derive(Error, Debug)]
pub enum AggregationError {
    /// Required fields are not declared in the dataset schema.
    #[error("Missing required fields during {stage}: {}", .missing_fields.join(", "))]
    Schema {
        stage: Stage,
        missing_fields: Vec<String>,
    },

    /// A declared join key is absent from one side of a join.
    #[error("Join key fields missing from {side} table: {}", .missing_fields.join(", "))]
    JoinKey {
        side: JoinSide,
        missing_fields: Vec<String>,
    },

    /// A statistic was required over zero qualifying records.
    #[error("No qualifying records for {what} during {stage}")]
    EmptyGroup { stage: Stage, what: String },

    /// Invalid configuration or request parameters.
    #[error("Invalid configuration during {stage}: {reason}")]
    InvalidConfig { stage: Stage, reason: String },

    /// Internal error (e.g., worker thread panic).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AggregationError>,
    },
}

impl AggregationError {
    /// Shorthand for a schema error listing the absent fields.
    pub fn schema(stage: Stage, missing_fields: Vec<String>) -> Self {
        AggregationError::Schema {
            stage,
            missing_fields,
        }
    }

    /// Shorthand for an invalid configuration error.
    pub fn invalid_config(stage: Stage, reason: impl Into<String>) -> Self {
        AggregationError::InvalidConfig {
            stage,
            reason: reason.into(),
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AggregationError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code for callers and reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "SCHEMA_ERROR",
            Self::JoinKey { .. } => "JOIN_KEY_ERROR",
            Self::EmptyGroup { .. } => "EMPTY_GROUP",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Fields reported missing by a schema or join key error.
    pub fn missing_fields(&self) -> &[String] {
        match self {
            Self::Schema { missing_fields, .. } | Self::JoinKey { missing_fields, .. } => {
                missing_fields
            }
            Self::WithContext { source, .. } => source.missing_fields(),
            _ => &[],
        }
    }

    /// Check if the caller can recover by fixing its input or request.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::EmptyGroup { .. } | Self::InvalidConfig { .. } => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

impl Serialize for AggregationError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AggregationError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AggregationError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| AggregationError::Polars(e).with_context(context))
    }
}
