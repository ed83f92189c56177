//! Pairwise association between numeric variables.
//!
//! [`CorrelationAnalyzer`] computes three kinds of [`CorrelationMatrix`]:
//!
//! - **Pearson**: linear correlation with an approximate two-sided p-value per pair
//! - **Spearman**: Pearson correlation of the rank-transformed columns
//! - **Mutual information proxy**: `-0.5 * ln(1 - r²)` derived from Pearson `r`
//!
//! The analyzer is stateless and works over column-major data: one `Vec<f64>`
//! per variable, all of the same length. Callers are responsible for coercing
//! their raw values into numbers beforehand.
//!
//! # Significance
//!
//! The p-value attached to a Pearson coefficient comes from the t statistic
//! `t = r * sqrt((n - 2) / (1 - r²))` mapped through a coarse bucket table.
//! It is good enough to tell "clearly significant" from "noise", and is not an
//! exact Student-t inference.
//!
//! # Examples
//!
//! ```
//! use popsynth_stats::correlation::{CorrelationAnalyzer, CorrelationMethod};
//!
//! let variables = vec!["a".to_owned(), "b".to_owned()];
//! let columns = vec![vec![1.0, 2.0, 3.0, 4.0], vec![2.0, 4.0, 6.0, 8.0]];
//!
//! let analyzer = CorrelationAnalyzer::new();
//! let matrix = analyzer
//!     .calculate_correlations(&variables, &columns, 0.1)
//!     .unwrap();
//! assert_eq!(matrix.method(), CorrelationMethod::Pearson);
//! assert!((matrix.get("a", "b").unwrap() - 1.0).abs() < 1e-12);
//! ```

use std::iter;

use serde::{Deserialize, Serialize};

/// The association measure stored in a [`CorrelationMatrix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    #[display("pearson")]
    Pearson,
    #[display("spearman")]
    Spearman,
    #[display("mutual_information")]
    MutualInformation,
}

impl CorrelationMethod {
    /// Whether the matrix holds coefficients in `[-1, 1]` with a unit diagonal.
    #[must_use]
    pub fn is_correlation(self) -> bool {
        matches!(self, Self::Pearson | Self::Spearman)
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CorrelationError {
    #[display("expected one column per variable, got {variables} variables and {columns} columns")]
    ColumnCountMismatch { variables: usize, columns: usize },
    #[display("column '{variable}' has {len} observations, expected {expected}")]
    RaggedColumn {
        variable: String,
        len: usize,
        expected: usize,
    },
    #[display("correlation matrix must be {size}x{size}")]
    NotSquare { size: usize },
}

/// An n×n association matrix over named variables.
///
/// For Pearson and Spearman matrices the diagonal is exactly `1.0`, the matrix
/// is symmetric and every entry lies in `[-1, 1]`. Mutual-information matrices
/// hold non-negative values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationMatrix {
    variables: Vec<String>,
    matrix: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    p_values: Option<Vec<Vec<f64>>>,
    method: CorrelationMethod,
}

/// One off-diagonal entry of a [`CorrelationMatrix`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationPair {
    pub first: String,
    pub second: String,
    pub value: f64,
    pub p_value: Option<f64>,
}

impl CorrelationMatrix {
    /// Builds a matrix, checking that it is square over `variables`.
    pub fn new(
        variables: Vec<String>,
        matrix: Vec<Vec<f64>>,
        p_values: Option<Vec<Vec<f64>>>,
        method: CorrelationMethod,
    ) -> Result<Self, CorrelationError> {
        let size = variables.len();
        let is_square = |m: &[Vec<f64>]| m.len() == size && m.iter().all(|row| row.len() == size);
        if !is_square(&matrix) || p_values.as_deref().is_some_and(|p| !is_square(p)) {
            return Err(CorrelationError::NotSquare { size });
        }
        Ok(Self {
            variables,
            matrix,
            p_values,
            method,
        })
    }

    /// An identity correlation matrix (no association between variables).
    #[must_use]
    pub fn identity(variables: Vec<String>) -> Self {
        let size = variables.len();
        let matrix = (0..size)
            .map(|i| (0..size).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        Self {
            variables,
            matrix,
            p_values: None,
            method: CorrelationMethod::Pearson,
        }
    }

    #[must_use]
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    #[must_use]
    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.matrix
    }

    #[must_use]
    pub fn p_values(&self) -> Option<&[Vec<f64>]> {
        self.p_values.as_deref()
    }

    #[must_use]
    pub fn method(&self) -> CorrelationMethod {
        self.method
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    #[must_use]
    pub fn index_of(&self, variable: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == variable)
    }

    /// Looks up the entry for a pair of variables by name.
    #[must_use]
    pub fn get(&self, first: &str, second: &str) -> Option<f64> {
        let i = self.index_of(first)?;
        let j = self.index_of(second)?;
        Some(self.matrix[i][j])
    }

    /// Upper-triangle pairs whose absolute value reaches `min_correlation`,
    /// strongest first.
    #[must_use]
    pub fn notable_pairs(&self, min_correlation: f64) -> Vec<CorrelationPair> {
        let mut pairs = self
            .upper_triangle()
            .filter(|(_, _, value)| value.abs() >= min_correlation)
            .map(|(i, j, value)| CorrelationPair {
                first: self.variables[i].clone(),
                second: self.variables[j].clone(),
                value,
                p_value: self.p_values.as_ref().map(|p| p[i][j]),
            })
            .collect::<Vec<_>>();
        pairs.sort_by(|a, b| b.value.abs().total_cmp(&a.value.abs()));
        pairs
    }

    fn upper_triangle(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.len()).flat_map(move |i| ((i + 1)..self.len()).map(move |j| (i, j, self.matrix[i][j])))
    }
}

/// Stateless service computing [`CorrelationMatrix`] values.
#[derive(Debug, Default, Clone, Copy)]
pub struct CorrelationAnalyzer;

impl CorrelationAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Pearson correlation matrix with approximate p-values.
    ///
    /// Non-finite observations are treated as `0.0`. Zero-variance columns
    /// correlate `0.0` with everything else. `min_correlation` only controls
    /// which pairs are reported as notable in the debug log.
    pub fn calculate_correlations(
        &self,
        variables: &[String],
        columns: &[Vec<f64>],
        min_correlation: f64,
    ) -> Result<CorrelationMatrix, CorrelationError> {
        let columns = check_columns(variables, columns)?;
        let n = columns.first().map_or(0, Vec::len);
        let size = variables.len();

        let mut matrix = vec![vec![0.0; size]; size];
        let mut p_values = vec![vec![0.0; size]; size];
        for i in 0..size {
            matrix[i][i] = 1.0;
            for j in (i + 1)..size {
                let r = pearson(&columns[i], &columns[j]);
                let p = approximate_p_value(r, n);
                matrix[i][j] = r;
                matrix[j][i] = r;
                p_values[i][j] = p;
                p_values[j][i] = p;
                if r.abs() < min_correlation {
                    log::debug!(
                        "correlation {}~{} = {r:.3} below notable threshold {min_correlation}",
                        variables[i],
                        variables[j]
                    );
                }
            }
        }

        CorrelationMatrix::new(
            variables.to_vec(),
            matrix,
            Some(p_values),
            CorrelationMethod::Pearson,
        )
    }

    /// Spearman rank correlation matrix.
    ///
    /// Ties receive consecutive ranks in input order.
    pub fn calculate_spearman_correlations(
        &self,
        variables: &[String],
        columns: &[Vec<f64>],
        min_correlation: f64,
    ) -> Result<CorrelationMatrix, CorrelationError> {
        let ranked = check_columns(variables, columns)?
            .iter()
            .map(|column| ranks(column))
            .collect::<Vec<_>>();
        let pearson = self.calculate_correlations(variables, &ranked, min_correlation)?;
        Ok(CorrelationMatrix {
            method: CorrelationMethod::Spearman,
            ..pearson
        })
    }

    /// Mutual-information proxy `-0.5 * ln(1 - r²)` for every pair.
    ///
    /// Exact only under joint normality; intended as a coarse signal of
    /// association strength. `|r| >= 0.999` is reported as `1.0`.
    pub fn detect_non_linear_correlations(
        &self,
        variables: &[String],
        columns: &[Vec<f64>],
    ) -> Result<CorrelationMatrix, CorrelationError> {
        let pearson = self.calculate_correlations(variables, columns, 0.0)?;
        let matrix = pearson
            .matrix
            .iter()
            .map(|row| row.iter().map(|&r| mutual_information_proxy(r)).collect())
            .collect();
        CorrelationMatrix::new(
            variables.to_vec(),
            matrix,
            None,
            CorrelationMethod::MutualInformation,
        )
    }
}

fn check_columns(
    variables: &[String],
    columns: &[Vec<f64>],
) -> Result<Vec<Vec<f64>>, CorrelationError> {
    if variables.len() != columns.len() {
        return Err(CorrelationError::ColumnCountMismatch {
            variables: variables.len(),
            columns: columns.len(),
        });
    }
    let expected = columns.first().map_or(0, Vec::len);
    iter::zip(variables, columns)
        .map(|(variable, column)| {
            if column.len() == expected {
                Ok(column
                    .iter()
                    .map(|v| if v.is_finite() { *v } else { 0.0 })
                    .collect())
            } else {
                Err(CorrelationError::RaggedColumn {
                    variable: variable.clone(),
                    len: column.len(),
                    expected,
                })
            }
        })
        .collect()
}

/// Pearson correlation of two equally long columns.
///
/// Returns `0.0` when either column has zero variance or fewer than two points.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    if x.len() < 2 {
        return 0.0;
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let numerator = iter::zip(x, y)
        .map(|(xi, yi)| (xi - mean_x) * (yi - mean_y))
        .sum::<f64>();
    let sum_sq_x = x.iter().map(|xi| (xi - mean_x).powi(2)).sum::<f64>();
    let sum_sq_y = y.iter().map(|yi| (yi - mean_y).powi(2)).sum::<f64>();

    if is_constant(sum_sq_x, mean_x, n) || is_constant(sum_sq_y, mean_y, n) {
        return 0.0;
    }
    (numerator / (sum_sq_x * sum_sq_y).sqrt()).clamp(-1.0, 1.0)
}

// rounding noise in the mean must not turn a constant column into a signal
fn is_constant(sum_sq: f64, mean: f64, n: f64) -> bool {
    sum_sq == 0.0 || sum_sq / n <= (1e-12 * mean.abs()).powi(2)
}

/// 1-based ranks; equal values keep their input order.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn ranks(column: &[f64]) -> Vec<f64> {
    let mut order = (0..column.len()).collect::<Vec<_>>();
    // sort_by is stable, so ties keep input order
    order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));
    let mut ranks = vec![0.0; column.len()];
    for (rank, index) in order.into_iter().enumerate() {
        ranks[index] = (rank + 1) as f64;
    }
    ranks
}

/// Coarse two-sided p-value for a Pearson coefficient over `n` observations.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn approximate_p_value(r: f64, n: usize) -> f64 {
    if n < 3 {
        return 1.0;
    }
    let denominator = 1.0 - r * r;
    let t = if denominator <= 0.0 {
        f64::INFINITY
    } else {
        (r * ((n as f64 - 2.0) / denominator).sqrt()).abs()
    };
    match t {
        t if t >= 3.291 => 0.001,
        t if t >= 2.576 => 0.01,
        t if t >= 1.960 => 0.05,
        t if t >= 1.645 => 0.10,
        _ => 0.5,
    }
}

/// `-0.5 * ln(1 - r²)`, saturating at `1.0` for `|r| >= 0.999`.
#[must_use]
pub fn mutual_information_proxy(r: f64) -> f64 {
    if r.abs() >= 0.999 {
        1.0
    } else {
        -0.5 * (1.0 - r * r).ln()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("v{i}")).collect()
    }

    #[test]
    fn test_perfect_negative_correlation() {
        let columns = vec![vec![1.0, 2.0, 3.0], vec![3.0, 2.0, 1.0]];
        let matrix = CorrelationAnalyzer::new()
            .calculate_correlations(&names(2), &columns, 0.1)
            .unwrap();
        assert!((matrix.get("v0", "v1").unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(matrix.p_values().unwrap()[0][1], 0.001);
    }

    #[test]
    fn test_constant_column_correlates_zero() {
        let columns = vec![vec![5.0; 4], vec![1.0, 2.0, 3.0, 4.0]];
        let matrix = CorrelationAnalyzer::new()
            .calculate_correlations(&names(2), &columns, 0.1)
            .unwrap();
        assert_eq!(matrix.matrix()[0][1], 0.0);
        assert_eq!(matrix.matrix()[0][0], 1.0);
        assert!(!matrix.matrix()[0][1].is_nan());
    }

    #[test]
    fn test_non_finite_values_are_coerced_to_zero() {
        let columns = vec![vec![f64::NAN, 1.0, 2.0], vec![0.0, 1.0, 2.0]];
        let matrix = CorrelationAnalyzer::new()
            .calculate_correlations(&names(2), &columns, 0.1)
            .unwrap();
        assert!((matrix.matrix()[0][1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ragged_columns_are_rejected() {
        let columns = vec![vec![1.0, 2.0], vec![1.0]];
        let err = CorrelationAnalyzer::new()
            .calculate_correlations(&names(2), &columns, 0.1)
            .unwrap_err();
        assert!(matches!(err, CorrelationError::RaggedColumn { .. }));
    }

    #[test]
    fn test_column_count_mismatch() {
        let err = CorrelationAnalyzer::new()
            .calculate_correlations(&names(3), &[vec![1.0]], 0.1)
            .unwrap_err();
        assert!(matches!(err, CorrelationError::ColumnCountMismatch { .. }));
    }

    #[test]
    fn test_ranks_keep_tie_order() {
        assert_eq!(ranks(&[3.0, 1.0, 3.0, 2.0]), vec![3.0, 1.0, 4.0, 2.0]);
    }

    #[test]
    fn test_spearman_sees_monotonic_relation() {
        let x = (1..=20).map(f64::from).collect::<Vec<_>>();
        let y = x.iter().map(|v| v.powi(3)).collect::<Vec<_>>();
        let analyzer = CorrelationAnalyzer::new();
        let spearman = analyzer
            .calculate_spearman_correlations(&names(2), &[x.clone(), y.clone()], 0.1)
            .unwrap();
        let pearson = analyzer
            .calculate_correlations(&names(2), &[x, y], 0.1)
            .unwrap();
        assert_eq!(spearman.method(), CorrelationMethod::Spearman);
        assert!((spearman.matrix()[0][1] - 1.0).abs() < 1e-12);
        assert!(pearson.matrix()[0][1] < spearman.matrix()[0][1]);
    }

    #[test]
    fn test_mutual_information_proxy() {
        assert_eq!(mutual_information_proxy(0.0), 0.0);
        assert_eq!(mutual_information_proxy(1.0), 1.0);
        assert_eq!(mutual_information_proxy(-1.0), 1.0);
        let mi = mutual_information_proxy(0.5);
        assert!((mi - (-0.5 * 0.75_f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn test_non_linear_matrix_is_non_negative() {
        let columns = vec![
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![2.0, 1.0, 4.0, 3.0, 5.0],
            vec![5.0, 4.0, 3.0, 2.0, 1.0],
        ];
        let mi = CorrelationAnalyzer::new()
            .detect_non_linear_correlations(&names(3), &columns)
            .unwrap();
        assert_eq!(mi.method(), CorrelationMethod::MutualInformation);
        assert!(mi.p_values().is_none());
        assert!(mi.matrix().iter().flatten().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_p_value_buckets() {
        assert_eq!(approximate_p_value(0.9, 2), 1.0);
        assert_eq!(approximate_p_value(0.0, 100), 0.5);
        // t = 0.2 * sqrt(98 / 0.96) ≈ 2.02
        assert_eq!(approximate_p_value(0.2, 100), 0.05);
        assert_eq!(approximate_p_value(0.5, 100), 0.001);
    }

    #[test]
    fn test_notable_pairs_sorted_by_strength() {
        let matrix = CorrelationMatrix::new(
            names(3),
            vec![
                vec![1.0, 0.05, -0.7],
                vec![0.05, 1.0, 0.3],
                vec![-0.7, 0.3, 1.0],
            ],
            None,
            CorrelationMethod::Pearson,
        )
        .unwrap();
        let pairs = matrix.notable_pairs(0.1);
        assert_eq!(pairs.len(), 2);
        assert_eq!((pairs[0].first.as_str(), pairs[0].second.as_str()), ("v0", "v2"));
        assert!((pairs[1].value - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_non_square_matrix_is_rejected() {
        let err = CorrelationMatrix::new(
            names(2),
            vec![vec![1.0, 0.0]],
            None,
            CorrelationMethod::Pearson,
        )
        .unwrap_err();
        assert!(matches!(err, CorrelationError::NotSquare { size: 2 }));
    }

    proptest! {
        #[test]
        fn prop_correlation_matrix_is_symmetric_with_unit_diagonal(
            rows in prop::collection::vec(prop::collection::vec(-1.0e3..1.0e3_f64, 3), 2..40),
            spearman in any::<bool>(),
        ) {
            let columns = (0..3)
                .map(|j| rows.iter().map(|row| row[j]).collect::<Vec<_>>())
                .collect::<Vec<_>>();
            let analyzer = CorrelationAnalyzer::new();
            let matrix = if spearman {
                analyzer.calculate_spearman_correlations(&names(3), &columns, 0.1)
            } else {
                analyzer.calculate_correlations(&names(3), &columns, 0.1)
            }
            .unwrap();

            prop_assert_eq!(matrix.len(), 3);
            for i in 0..3 {
                prop_assert_eq!(matrix.matrix()[i].len(), 3);
                prop_assert!((matrix.matrix()[i][i] - 1.0).abs() < 1e-12);
                for j in 0..3 {
                    let v = matrix.matrix()[i][j];
                    prop_assert!((-1.0..=1.0).contains(&v));
                    prop_assert!((v - matrix.matrix()[j][i]).abs() < 1e-12);
                }
            }
        }
    }
}
