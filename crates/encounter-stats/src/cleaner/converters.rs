//! Value conversion functions for field cleaning.
//!
//! Each converter returns [`Coerced`], separating "was null already" from
//! "failed to coerce" so only the latter becomes a coercion warning.

use crate::dataset::Value;
use crate::utils::{format_number, parse_strict_f64};
use chrono::{NaiveDate, NaiveDateTime};

/// Outcome of converting one cell.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Coerced {
    Ok(Value),
    /// The input was already null.
    Null,
    /// The input was non-null but could not be converted.
    Failed,
}

/// Timestamp layouts accepted for temporal fields, tried in order.
const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Parse a timestamp in one of the accepted layouts, or a bare date as midnight.
pub(crate) fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Convert a cell to a timestamp.
pub(crate) fn to_temporal(value: &Value) -> Coerced {
    match value {
        Value::Null => Coerced::Null,
        Value::Timestamp(ts) => Coerced::Ok(Value::Timestamp(*ts)),
        Value::Text(s) => parse_timestamp(s).map_or(Coerced::Failed, |ts| Coerced::Ok(ts.into())),
        Value::Number(_) => Coerced::Failed,
    }
}

/// Convert a cell to a finite number.
pub(crate) fn to_numeric(value: &Value) -> Coerced {
    match value {
        Value::Null => Coerced::Null,
        Value::Number(v) if v.is_finite() => Coerced::Ok(Value::number(*v)),
        Value::Text(s) if s.trim().is_empty() => Coerced::Null,
        Value::Text(s) => {
            parse_strict_f64(s).map_or(Coerced::Failed, |v| Coerced::Ok(Value::number(v)))
        }
        _ => Coerced::Failed,
    }
}

/// Trim a categorical cell to text, substituting `marker` for missing values.
///
/// Null, blank, and any case variant of the marker itself all become the
/// marker exactly as configured.
pub(crate) fn normalize_category(value: &Value, marker: &str) -> Value {
    let text = match value {
        Value::Null => return Value::text(marker),
        Value::Text(s) => s.trim().to_string(),
        Value::Number(v) => format_number(*v),
        Value::Timestamp(_) => value.to_string(),
    };

    if text.is_empty() || text.eq_ignore_ascii_case(marker) {
        Value::text(marker)
    } else {
        Value::Text(text)
    }
}

/// Numeric coercion followed by clamp-then-remap.
///
/// Values above `threshold` are clamped to it first; afterwards any value
/// equal to `anchor` becomes `replacement`.
pub(crate) fn clip_and_remap(
    value: &Value,
    threshold: f64,
    anchor: f64,
    replacement: f64,
) -> Coerced {
    match to_numeric(value) {
        Coerced::Ok(Value::Number(v)) => {
            let clamped = if v > threshold { threshold } else { v };
            let remapped = if clamped == anchor { replacement } else { clamped };
            Coerced::Ok(Value::number(remapped))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    // ========================================================================
    // to_temporal() tests
    // ========================================================================

    #[test]
    fn test_parse_timestamp_formats() {
        let ts = parse_timestamp("2180-05-06 22:23:00").unwrap();
        assert_eq!(ts.hour(), 22);
        assert_eq!(ts.minute(), 23);

        assert!(parse_timestamp("2180-05-06T22:23:00").is_some());
        assert!(parse_timestamp("2180-05-06 22:23").is_some());
        assert!(parse_timestamp("2180-05-06 22:23:00.000000").is_some());
        assert_eq!(parse_timestamp("2180-05-06").unwrap().hour(), 0);
    }

    #[test]
    fn test_parse_timestamp_invalid() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("2180-13-40 10:00:00").is_none());
    }

    #[test]
    fn test_to_temporal_outcomes() {
        assert_eq!(to_temporal(&Value::Null), Coerced::Null);
        assert_eq!(to_temporal(&Value::number(5.0)), Coerced::Failed);
        assert!(matches!(
            to_temporal(&Value::text("2150-01-01 08:00:00")),
            Coerced::Ok(Value::Timestamp(_))
        ));
    }

    // ========================================================================
    // to_numeric() tests
    // ========================================================================

    #[test]
    fn test_to_numeric() {
        assert_eq!(to_numeric(&Value::text(" 12.5 ")), Coerced::Ok(Value::number(12.5)));
        assert_eq!(to_numeric(&Value::number(3.0)), Coerced::Ok(Value::number(3.0)));
        assert_eq!(to_numeric(&Value::text("NEG")), Coerced::Failed);
        assert_eq!(to_numeric(&Value::text("   ")), Coerced::Null);
        assert_eq!(to_numeric(&Value::Null), Coerced::Null);
        assert_eq!(to_numeric(&Value::number(f64::NAN)), Coerced::Failed);
    }

    // ========================================================================
    // normalize_category() tests
    // ========================================================================

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category(&Value::text("  HOME "), "UNKNOWN"), Value::text("HOME"));
        assert_eq!(normalize_category(&Value::Null, "UNKNOWN"), Value::text("UNKNOWN"));
        assert_eq!(normalize_category(&Value::text(""), "UNKNOWN"), Value::text("UNKNOWN"));
        assert_eq!(normalize_category(&Value::text("unknown"), "UNKNOWN"), Value::text("UNKNOWN"));
        assert_eq!(normalize_category(&Value::number(4019.0), "UNKNOWN"), Value::text("4019"));
    }

    // ========================================================================
    // clip_and_remap() tests
    // ========================================================================

    #[test]
    fn test_clip_and_remap_age_policy() {
        let ages: Vec<Value> = [70.0, 89.0, 95.0].into_iter().map(Value::number).collect();
        let cleaned: Vec<Coerced> = ages
            .iter()
            .map(|a| clip_and_remap(a, 89.0, 89.0, 91.0))
            .collect();
        assert_eq!(
            cleaned,
            vec![
                Coerced::Ok(Value::number(70.0)),
                Coerced::Ok(Value::number(91.0)),
                Coerced::Ok(Value::number(91.0)),
            ]
        );
    }

    #[test]
    fn test_clip_and_remap_passes_through_failures() {
        assert_eq!(clip_and_remap(&Value::text("old"), 89.0, 89.0, 91.0), Coerced::Failed);
        assert_eq!(clip_and_remap(&Value::Null, 89.0, 89.0, 91.0), Coerced::Null);
    }
}
