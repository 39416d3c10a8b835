//! Half-open histogram bucketing.

use crate::dataset::Tabular;
use crate::error::{AggregationError, Result, Stage};
use crate::types::{Histogram, HistogramBin};
use crate::validator::SchemaValidator;
use tracing::debug;

/// Count `values` into the bins `[edges[i], edges[i + 1])`.
///
/// Edges must be finite, strictly increasing and at least two. A value on an
/// interior edge belongs to the higher bin. Values below the first edge are
/// counted in `below`; values at or above the last edge, and NaN, in `above`.
pub fn bucketize(values: impl IntoIterator<Item = f64>, edges: &[f64]) -> Result<Histogram> {
    validate_edges(edges)?;

    let mut bins: Vec<HistogramBin> = edges
        .windows(2)
        .map(|w| HistogramBin {
            lo: w[0],
            hi: w[1],
            count: 0,
        })
        .collect();
    let mut below = 0;
    let mut above = 0;
    let first = edges[0];
    let last = edges[edges.len() - 1];

    for value in values {
        if value.is_nan() || value >= last {
            above += 1;
        } else if value < first {
            below += 1;
        } else {
            // number of edges <= value, minus one, is the bin index
            let idx = edges.partition_point(|e| *e <= value) - 1;
            bins[idx].count += 1;
        }
    }

    Ok(Histogram {
        bins,
        below,
        above,
        missing: 0,
    })
}

/// Bucket the numeric values of `field`, counting null or non-numeric cells as `missing`.
pub fn bucketize_field<T: Tabular + ?Sized>(
    data: &T,
    field: &str,
    edges: &[f64],
) -> Result<Histogram> {
    SchemaValidator::check(data, &[field], Stage::Histogram)?;

    let mut missing = 0;
    let values: Vec<f64> = data
        .records()
        .iter()
        .filter_map(|r| {
            let v = r.value(field).as_f64();
            if v.is_none() {
                missing += 1;
            }
            v
        })
        .collect();

    let mut histogram = bucketize(values, edges)?;
    histogram.missing = missing;
    debug!(
        "Bucketed '{}': {} binned, {} out of range, {} missing",
        field,
        histogram.binned(),
        histogram.out_of_range(),
        missing
    );
    Ok(histogram)
}

fn validate_edges(edges: &[f64]) -> Result<()> {
    if edges.len() < 2 {
        return Err(AggregationError::invalid_config(
            Stage::Histogram,
            format!("at least two bin edges are required, got {}", edges.len()),
        ));
    }
    if let Some(bad) = edges.iter().find(|e| !e.is_finite()) {
        return Err(AggregationError::invalid_config(
            Stage::Histogram,
            format!("bin edges must be finite, got {}", bad),
        ));
    }
    if let Some(w) = edges.windows(2).find(|w| w[0] >= w[1]) {
        return Err(AggregationError::invalid_config(
            Stage::Histogram,
            format!("bin edges must be strictly increasing ({} >= {})", w[0], w[1]),
        ));
    }
    Ok(())
}
