//! Shared utilities for the aggregation engine.
//!
//! This module contains common helper functions used across multiple modules
//! so that parsing and rounding rules stay identical at every call site.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a polars data type at the input boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Date or datetime types
    Datetime,
    /// Boolean type
    Boolean,
    /// String/text type
    String,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Datetime(_, _) | DataType::Date | DataType::Time
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if is_datetime_dtype(dtype) {
        DtypeCategory::Datetime
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// Parsing and Formatting
// =============================================================================

/// Parse trimmed text as a finite `f64`.
///
/// No thousands separators, units or currency symbols are stripped: a lab
/// value such as `"<0.5"` or `"NEG"` is not a number.
pub fn parse_strict_f64(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Render a number without a trailing `.0` when it is integral.
///
/// ```rust,ignore
/// assert_eq!(format_number(4019.0), "4019");
/// assert_eq!(format_number(2.5), "2.5");
/// ```
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

// =============================================================================
// Rounding
// =============================================================================

/// Decimal places used for every percentage the engine reports.
pub const PERCENT_PRECISION: u32 = 2;

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// `part / whole * 100`, rounded to [`PERCENT_PRECISION`]. `None` when `whole` is zero.
pub fn percent_of(part: usize, whole: usize) -> Option<f64> {
    if whole == 0 {
        return None;
    }
    Some(round_to(
        part as f64 / whole as f64 * 100.0,
        PERCENT_PRECISION,
    ))
}
