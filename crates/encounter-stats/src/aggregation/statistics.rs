//! Central-tendency helpers shared by aggregation and recombination.

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median, averaging the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Mean of `(mean, weight)` pairs weighted by `weight`.
///
/// Pairs with zero weight or no mean contribute nothing. `None` when the
/// total weight is zero.
pub fn weighted_mean(parts: impl IntoIterator<Item = (Option<f64>, usize)>) -> Option<f64> {
    let (sum, weight) = parts
        .into_iter()
        .filter(|(_, w)| *w > 0)
        .filter_map(|(m, w)| m.map(|m| (m * w as f64, w)))
        .fold((0.0, 0usize), |(s, t), (m, w)| (s + m, t + w));
    if weight == 0 {
        None
    } else {
        Some(sum / weight as f64)
    }
}
