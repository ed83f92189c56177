//! Kolmogorov–Smirnov distance between distributions.
//!
//! Two flavours are provided:
//!
//! - [`two_sample_statistic`]: the supremum distance between two empirical CDFs
//! - [`one_sample_statistic`]: the supremum distance between an empirical CDF
//!   and a reference CDF given as a closure
//!
//! Both return a value in `[0, 1]`. Empty inputs yield `1.0` (maximal
//! distance), so callers scoring `1 - D` get `0.0` for them.

/// Two-sample KS statistic `D = sup |F_a(x) - F_b(x)|`.
///
/// Non-finite values are ignored.
///
/// # Examples
///
/// ```
/// use popsynth_stats::ks;
///
/// let a = [1.0, 2.0, 3.0, 4.0];
/// assert_eq!(ks::two_sample_statistic(&a, &a), 0.0);
///
/// let b = [10.0, 11.0, 12.0];
/// assert_eq!(ks::two_sample_statistic(&a, &b), 1.0);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn two_sample_statistic(a: &[f64], b: &[f64]) -> f64 {
    let a = sorted_finite(a);
    let b = sorted_finite(b);
    if a.is_empty() || b.is_empty() {
        return 1.0;
    }

    let (na, nb) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0, 0);
    let mut d = 0.0_f64;
    while i < a.len() && j < b.len() {
        let x = f64::min(a[i], b[j]);
        // advance past every tie so both CDFs are evaluated at the same point
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / na - j as f64 / nb).abs());
    }
    d
}

/// One-sample KS statistic against a reference CDF.
///
/// Non-finite values are ignored.
///
/// ```
/// use popsynth_stats::ks;
///
/// let sample = [0.1, 0.3, 0.5, 0.7, 0.9];
/// let d = ks::one_sample_statistic(&sample, |x| x.clamp(0.0, 1.0));
/// assert!(d <= 0.1 + 1e-12);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn one_sample_statistic<F>(sample: &[f64], cdf: F) -> f64
where
    F: Fn(f64) -> f64,
{
    let sorted = sorted_finite(sample);
    if sorted.is_empty() {
        return 1.0;
    }
    let n = sorted.len() as f64;
    sorted
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let f = cdf(x);
            let upper = (i + 1) as f64 / n - f;
            let lower = f - i as f64 / n;
            upper.max(lower)
        })
        .fold(0.0, f64::max)
        .clamp(0.0, 1.0)
}

/// Critical value of the two-sample statistic at the 5 % level.
///
/// Uses the asymptotic approximation `1.36 * sqrt((n + m) / (n * m))`.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn two_sample_critical_value(n: usize, m: usize) -> f64 {
    if n == 0 || m == 0 {
        return f64::INFINITY;
    }
    let (n, m) = (n as f64, m as f64);
    1.36 * ((n + m) / (n * m)).sqrt()
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect::<Vec<_>>();
    sorted.sort_by(f64::total_cmp);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sample_is_maximal_distance() {
        assert_eq!(two_sample_statistic(&[], &[1.0]), 1.0);
        assert_eq!(one_sample_statistic(&[], |_| 0.5), 1.0);
    }

    #[test]
    fn test_half_overlap() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [3.0, 4.0, 5.0, 6.0];
        assert!((two_sample_statistic(&a, &b) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_ties_across_samples() {
        let a = [1.0, 1.0, 2.0, 2.0];
        let b = [1.0, 2.0];
        assert_eq!(two_sample_statistic(&a, &b), 0.0);
    }

    #[test]
    fn test_ignores_non_finite() {
        let a = [1.0, f64::NAN, 2.0, f64::INFINITY];
        let b = [1.0, 2.0];
        assert_eq!(two_sample_statistic(&a, &b), 0.0);
    }

    #[test]
    fn test_point_mass_against_continuous_cdf() {
        let sample = [0.0; 10];
        // CDF jumps from 0 to 1 at 0 while the reference is 0.5 there
        let d = one_sample_statistic(&sample, |x| if x < 0.0 { 0.0 } else { 0.5 });
        assert!((d - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_critical_value_shrinks_with_size() {
        assert!(two_sample_critical_value(1000, 1000) < two_sample_critical_value(10, 10));
        assert!(two_sample_critical_value(0, 10).is_infinite());
    }
}
