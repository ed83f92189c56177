use serde::Serialize;

use crate::{descriptive::DescriptiveStats, percentiles::Percentiles};

/// Descriptive statistics paired with precomputed percentiles.
///
/// # Examples
///
/// ```
/// use popsynth_stats::summary::SummaryStats;
///
/// let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
/// let summary = SummaryStats::new(values, &[25.0, 50.0, 75.0]).unwrap();
///
/// assert_eq!(summary.stats.mean, 5.5);
/// assert_eq!(summary.percentiles.get(50.0), Some(summary.stats.median));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    /// Basic descriptive statistics for the dataset.
    pub stats: DescriptiveStats,
    /// Precomputed percentile values for quick lookup.
    pub percentiles: Percentiles,
}

impl SummaryStats {
    /// Computes summary statistics from unsorted values.
    ///
    /// Returns `None` if the dataset is empty.
    #[must_use]
    pub fn new<I>(values: I, percentile_points: &[f64]) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut sorted = values.into_iter().collect::<Vec<_>>();
        sorted.sort_by(f64::total_cmp);
        Self::from_sorted(&sorted, percentile_points)
    }

    /// Computes summary statistics from pre-sorted values.
    ///
    /// # Panics
    ///
    /// Panics if `sorted_values` is not sorted in ascending order.
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64], percentile_points: &[f64]) -> Option<Self> {
        let stats = DescriptiveStats::from_sorted(sorted_values)?;
        let percentiles = Percentiles::from_sorted(sorted_values, percentile_points);
        Some(Self { stats, percentiles })
    }
}
