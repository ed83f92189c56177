use serde::Serialize;

/// A value at a given percentile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentilePoint {
    /// In `0.0..=100.0`.
    pub percentile: f64,
    pub value: f64,
}

/// Percentiles of a sample, computed once for a fixed set of points.
///
/// Values between ranks are linearly interpolated, so the 50th percentile
/// equals the median.
///
/// # Examples
///
/// ```
/// use popsynth_stats::percentiles::Percentiles;
///
/// let values = [10.0, 1.0, 4.0, 7.0, 3.0, 9.0, 2.0, 6.0, 8.0, 5.0];
/// let percentiles = Percentiles::new(&values, &[25.0, 50.0, 100.0]);
///
/// assert_eq!(percentiles.get(50.0), Some(5.5));
/// assert_eq!(percentiles.get(25.0), Some(3.25));
/// assert_eq!(percentiles.get(100.0), Some(10.0));
/// assert_eq!(percentiles.get(75.0), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Percentiles(Vec<PercentilePoint>);

impl Percentiles {
    #[must_use]
    pub fn new(values: &[f64], points: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self::from_sorted(&sorted, points)
    }

    /// # Panics
    ///
    /// Panics if `sorted_values` is not in ascending order.
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64], points: &[f64]) -> Self {
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );
        Self(
            points
                .iter()
                .map(|&percentile| PercentilePoint {
                    percentile,
                    value: compute_percentile(sorted_values, percentile),
                })
                .collect(),
        )
    }

    /// The value at `percentile`, if it was one of the computed points.
    #[must_use]
    pub fn get(&self, percentile: f64) -> Option<f64> {
        self.0
            .iter()
            .find(|point| (point.percentile - percentile).abs() < f64::EPSILON)
            .map(|point| point.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = PercentilePoint> + '_ {
        self.0.iter().copied()
    }
}

/// Linearly interpolated percentile of ascending `sorted_values`.
///
/// The percentile is clamped to `0..=100`. Returns `NaN` for an empty slice.
///
/// ```
/// use popsynth_stats::percentiles::compute_percentile;
///
/// let values = [1.0, 2.0, 3.0, 4.0];
/// assert_eq!(compute_percentile(&values, 0.0), 1.0);
/// assert_eq!(compute_percentile(&values, 50.0), 2.5);
/// assert!(compute_percentile(&[], 50.0).is_nan());
/// ```
#[expect(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn compute_percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    let Some(last) = sorted_values.len().checked_sub(1) else {
        return f64::NAN;
    };
    let rank = percentile.clamp(0.0, 100.0) / 100.0 * last as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(last);
    let weight = rank - rank.floor();
    sorted_values[lower] + (sorted_values[upper] - sorted_values[lower]) * weight
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_single_value() {
        let percentiles = Percentiles::new(&[4.0], &[0.0, 50.0, 100.0]);
        assert!(percentiles.iter().all(|point| point.value == 4.0));
    }

    #[test]
    fn test_serialized_shape() {
        let percentiles = Percentiles::new(&[1.0, 3.0], &[50.0]);
        let json = serde_json::to_string(&percentiles).unwrap();
        assert_eq!(json, r#"[{"percentile":50.0,"value":2.0}]"#);
    }

    proptest! {
        #[test]
        fn percentiles_stay_within_range_and_grow(
            values in prop::collection::vec(-1e6..1e6_f64, 1..50),
            p in 0.0..100.0_f64,
        ) {
            let mut sorted = values;
            sorted.sort_by(f64::total_cmp);
            let low = compute_percentile(&sorted, p);
            let high = compute_percentile(&sorted, (p + 10.0).min(100.0));
            prop_assert!(low >= sorted[0] - 1e-6 && low <= sorted[sorted.len() - 1] + 1e-6);
            prop_assert!(high >= low - 1e-6);
        }
    }
}
