//! Configuration for the clinical analyses.
//!
//! This module provides the tunable parameters of every analysis using the
//! builder pattern. All fields have defaults, so a JSON config file only
//! needs the fields it overrides.

use crate::cleaner::{CoercionRule, DEFAULT_MISSING_MARKER};
use serde::{Deserialize, Serialize};

/// Clamp-then-remap policy for de-identified ages.
///
/// Ages above `threshold` are clamped to it, then `anchor` is replaced with
/// `replacement`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeCap {
    pub threshold: f64,
    pub anchor: f64,
    pub replacement: f64,
}

impl Default for AgeCap {
    fn default() -> Self {
        Self {
            threshold: 89.0,
            anchor: 89.0,
            replacement: 91.0,
        }
    }
}

impl AgeCap {
    /// The coercion rule implementing this policy.
    pub fn rule(&self) -> CoercionRule {
        CoercionRule::ClipAndRemap {
            threshold: self.threshold,
            anchor: self.anchor,
            replacement: self.replacement,
        }
    }
}

/// Configuration for the analyses.
///
/// Use [`AnalysisConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use encounter_stats::config::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .top_n(5)
///     .partition_count(4)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of entries kept by top-N rankings.
    /// Default: 10
    pub top_n: usize,

    /// Histogram bin edges for length of stay, in days.
    /// Default: 0, 1, ..., 14
    pub los_bin_edges: Vec<f64>,

    /// Number of partitions for the split age analysis.
    /// Default: 2
    pub partition_count: usize,

    /// Age capping policy applied to `anchor_age`.
    /// Default: clamp at 89, remap 89 to 91
    pub age_cap: AgeCap,

    /// Marker substituted for missing categorical values.
    /// Default: "UNKNOWN"
    pub missing_marker: String,

    /// Stays at or below this many days are invalid.
    /// Default: 0.0
    pub min_length_of_stay_days: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            los_bin_edges: default_los_bin_edges(),
            partition_count: 2,
            age_cap: AgeCap::default(),
            missing_marker: DEFAULT_MISSING_MARKER.to_string(),
            min_length_of_stay_days: 0.0,
        }
    }
}

fn default_los_bin_edges() -> Vec<f64> {
    (0..=14).map(f64::from).collect()
}

impl AnalysisConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.top_n == 0 {
            return Err(ConfigValidationError::InvalidCount {
                field: "top_n".to_string(),
                value: self.top_n,
            });
        }

        if self.partition_count == 0 {
            return Err(ConfigValidationError::InvalidCount {
                field: "partition_count".to_string(),
                value: self.partition_count,
            });
        }

        if self.los_bin_edges.len() < 2
            || self.los_bin_edges.iter().any(|e| !e.is_finite())
            || self.los_bin_edges.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(ConfigValidationError::InvalidBinEdges(
                self.los_bin_edges.clone(),
            ));
        }

        let AgeCap {
            threshold,
            anchor,
            replacement,
        } = self.age_cap;
        if ![threshold, anchor, replacement].iter().all(|v| v.is_finite()) {
            return Err(ConfigValidationError::InvalidAgeCap(self.age_cap));
        }

        if self.missing_marker.trim().is_empty() {
            return Err(ConfigValidationError::EmptyMissingMarker);
        }

        if !self.min_length_of_stay_days.is_finite() {
            return Err(ConfigValidationError::InvalidMinimum(
                self.min_length_of_stay_days,
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid value for '{field}': {value} (must be at least 1)")]
    InvalidCount { field: String, value: usize },

    #[error("Invalid bin edges {0:?} (need at least two finite, strictly increasing edges)")]
    InvalidBinEdges(Vec<f64>),

    #[error("Invalid age cap {0:?} (all values must be finite)")]
    InvalidAgeCap(AgeCap),

    #[error("Missing marker must not be empty")]
    EmptyMissingMarker,

    #[error("Invalid minimum length of stay: {0} (must be finite)")]
    InvalidMinimum(f64),
}

/// Builder for [`AnalysisConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    top_n: Option<usize>,
    los_bin_edges: Option<Vec<f64>>,
    partition_count: Option<usize>,
    age_cap: Option<AgeCap>,
    missing_marker: Option<String>,
    min_length_of_stay_days: Option<f64>,
}

impl AnalysisConfigBuilder {
    /// Set the number of entries kept by top-N rankings.
    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }

    /// Set the length-of-stay histogram edges, in days.
    pub fn los_bin_edges(mut self, edges: Vec<f64>) -> Self {
        self.los_bin_edges = Some(edges);
        self
    }

    /// Set the number of partitions for the split age analysis.
    pub fn partition_count(mut self, k: usize) -> Self {
        self.partition_count = Some(k);
        self
    }

    pub fn age_cap(mut self, cap: AgeCap) -> Self {
        self.age_cap = Some(cap);
        self
    }

    /// Set the marker substituted for missing categorical values.
    pub fn missing_marker(mut self, marker: impl Into<String>) -> Self {
        self.missing_marker = Some(marker.into());
        self
    }

    /// Set the length of stay (in days) at or below which a stay is invalid.
    pub fn min_length_of_stay_days(mut self, days: f64) -> Self {
        self.min_length_of_stay_days = Some(days);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `AnalysisConfig` or an error if validation fails.
    pub fn build(self) -> Result<AnalysisConfig, ConfigValidationError> {
        let config = AnalysisConfig {
            top_n: self.top_n.unwrap_or(10),
            los_bin_edges: self.los_bin_edges.unwrap_or_else(default_los_bin_edges),
            partition_count: self.partition_count.unwrap_or(2),
            age_cap: self.age_cap.unwrap_or_default(),
            missing_marker: self
                .missing_marker
                .unwrap_or_else(|| DEFAULT_MISSING_MARKER.to_string()),
            min_length_of_stay_days: self.min_length_of_stay_days.unwrap_or(0.0),
        };

        config.validate()?;
        Ok(config)
    }
}
