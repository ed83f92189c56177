//! Per-variable selection of the best-fitting distribution family.
//!
//! [`DistributionFitter`] tries every configured [`DistributionFamily`] on a
//! sample, scores each successful fit by `1 - D` where `D` is a
//! Kolmogorov–Smirnov distance, and ranks the candidates.
//!
//! Two scoring modes are available ([`GoodnessOfFit`]):
//!
//! - **Monte Carlo** (default): `D` is the two-sample statistic between the
//!   observed values and `monte_carlo_draws` values drawn from the fit.
//!   Scores are therefore stochastic and depend on the caller's RNG.
//! - **Analytic**: `D` is the one-sample statistic against the fit's
//!   closed-form CDF. Deterministic.

use std::collections::BTreeMap;

use popsynth_stats::ks;
use rand::Rng;
use rand_distr::Distribution as _;
use serde::{Deserialize, Serialize};

use crate::family::{DistributionFamily, FamilyFit, FitRejection, FittedDistribution};

/// Smallest number of finite values a sample needs to be fitted at all.
pub const MIN_USABLE_VALUES: usize = 3;

/// Default number of draws used by [`GoodnessOfFit::MonteCarlo`].
pub const DEFAULT_MONTE_CARLO_DRAWS: usize = 1000;

/// How a fitted distribution is compared with the observed sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GoodnessOfFit {
    #[default]
    MonteCarlo,
    Analytic,
}

/// Settings for [`DistributionFitter`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitterConfig {
    /// Families to try, in order. Ties in score keep this order.
    pub candidates: Vec<DistributionFamily>,
    pub monte_carlo_draws: usize,
    pub goodness_of_fit: GoodnessOfFit,
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            candidates: DistributionFamily::ALL.to_vec(),
            monte_carlo_draws: DEFAULT_MONTE_CARLO_DRAWS,
            goodness_of_fit: GoodnessOfFit::default(),
        }
    }
}

/// One scored candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFit {
    pub family: DistributionFamily,
    pub distribution: FittedDistribution,
    pub parameters: BTreeMap<String, f64>,
    /// `1 - D`, in `[0, 1]`.
    pub goodness_of_fit: f64,
}

/// Ranked fitting result for one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionFit {
    pub variable: String,
    pub best_fit: CandidateFit,
    /// Remaining candidates, best first.
    pub alternatives: Vec<CandidateFit>,
}

impl DistributionFit {
    /// Iterates over the best fit followed by the alternatives.
    pub fn candidates(&self) -> impl Iterator<Item = &CandidateFit> {
        std::iter::once(&self.best_fit).chain(&self.alternatives)
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum FitError {
    #[display("variable '{variable}' has {usable} usable values, at least {required} required")]
    InsufficientData {
        variable: String,
        usable: usize,
        required: usize,
    },
    #[display("no distribution family could be fitted to '{variable}'")]
    NoFittableDistribution {
        variable: String,
        rejections: Vec<(DistributionFamily, FitRejection)>,
    },
}

/// Fits and ranks distribution families.
///
/// # Examples
///
/// ```
/// use popsynth_model::{
///     family::DistributionFamily,
///     fitter::{DistributionFitter, FitterConfig, GoodnessOfFit},
/// };
///
/// let fitter = DistributionFitter::new(FitterConfig {
///     candidates: vec![DistributionFamily::Normal, DistributionFamily::Uniform],
///     goodness_of_fit: GoodnessOfFit::Analytic,
///     ..FitterConfig::default()
/// });
/// let values = (0..100).map(f64::from).collect::<Vec<_>>();
/// let fit = fitter
///     .fit_distribution("score", &values, &mut rand::rng())
///     .unwrap();
/// assert_eq!(fit.best_fit.family, DistributionFamily::Uniform);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DistributionFitter {
    config: FitterConfig,
}

impl DistributionFitter {
    #[must_use]
    pub fn new(config: FitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &FitterConfig {
        &self.config
    }

    /// Fits every candidate family to `values` and ranks them by goodness-of-fit.
    ///
    /// Non-finite values are ignored. Families whose preconditions fail are
    /// skipped; the error lists why when none remain.
    pub fn fit_distribution<R>(
        &self,
        variable: &str,
        values: &[f64],
        rng: &mut R,
    ) -> Result<DistributionFit, FitError>
    where
        R: Rng + ?Sized,
    {
        let sample = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect::<Vec<_>>();
        if sample.len() < MIN_USABLE_VALUES {
            return Err(FitError::InsufficientData {
                variable: variable.to_owned(),
                usable: sample.len(),
                required: MIN_USABLE_VALUES,
            });
        }

        let mut scored = vec![];
        let mut rejections = vec![];
        for &family in &self.config.candidates {
            match family.fit(&sample).and_then(|fit| self.score(&sample, fit, rng)) {
                Ok(candidate) => {
                    log::debug!(
                        "{variable}: {family} scored {:.4}",
                        candidate.goodness_of_fit
                    );
                    scored.push(candidate);
                }
                Err(rejection) => {
                    log::debug!("{variable}: {family} skipped ({rejection})");
                    rejections.push((family, rejection));
                }
            }
        }

        // stable, so equal scores keep candidate order
        scored.sort_by(|a, b| b.goodness_of_fit.total_cmp(&a.goodness_of_fit));
        let mut ranked = scored.into_iter();
        let Some(best_fit) = ranked.next() else {
            return Err(FitError::NoFittableDistribution {
                variable: variable.to_owned(),
                rejections,
            });
        };
        Ok(DistributionFit {
            variable: variable.to_owned(),
            best_fit,
            alternatives: ranked.collect(),
        })
    }

    fn score<R>(
        &self,
        sample: &[f64],
        fit: FamilyFit,
        rng: &mut R,
    ) -> Result<CandidateFit, FitRejection>
    where
        R: Rng + ?Sized,
    {
        let FamilyFit {
            distribution,
            fixed_score,
        } = fit;
        let goodness_of_fit = match fixed_score {
            Some(score) => score,
            None => {
                let d = match self.config.goodness_of_fit {
                    GoodnessOfFit::MonteCarlo => {
                        let sampler = distribution.sampler()?;
                        let draws = (0..self.config.monte_carlo_draws)
                            .map(|_| sampler.sample(rng))
                            .collect::<Vec<_>>();
                        ks::two_sample_statistic(sample, &draws)
                    }
                    GoodnessOfFit::Analytic => {
                        let analytic = distribution.analytic()?;
                        ks::one_sample_statistic(sample, |x| analytic.cdf(x))
                    }
                };
                (1.0 - d).clamp(0.0, 1.0)
            }
        };
        Ok(CandidateFit {
            family: distribution.family(),
            parameters: distribution.parameters(),
            distribution,
            goodness_of_fit,
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_distr::{Distribution as _, Normal};
    use rand_pcg::Pcg32;

    use super::*;

    fn normal_sample(rng: &mut Pcg32, n: usize) -> Vec<f64> {
        let normal = Normal::new(50.0, 10.0).unwrap();
        (0..n).map(|_| normal.sample(rng)).collect()
    }

    #[test]
    fn test_recovers_normal_parameters() {
        let mut rng = Pcg32::seed_from_u64(42);
        let values = normal_sample(&mut rng, 1000);
        let fitter = DistributionFitter::new(FitterConfig {
            candidates: vec![
                DistributionFamily::Normal,
                DistributionFamily::Uniform,
                DistributionFamily::Exponential,
            ],
            ..FitterConfig::default()
        });

        let fit = fitter.fit_distribution("x", &values, &mut rng).unwrap();
        assert_eq!(fit.best_fit.family, DistributionFamily::Normal);
        let FittedDistribution::Normal { mean, std_dev } = fit.best_fit.distribution else {
            panic!("expected normal");
        };
        assert!((mean - 50.0).abs() < 2.0, "mean = {mean}");
        assert!((std_dev - 10.0).abs() < 2.0, "std_dev = {std_dev}");
        assert_eq!(fit.best_fit.parameters["mean"], mean);
    }

    #[test]
    fn test_candidates_are_ranked() {
        let mut rng = Pcg32::seed_from_u64(3);
        let values = normal_sample(&mut rng, 200);
        let fit = DistributionFitter::default()
            .fit_distribution("x", &values, &mut rng)
            .unwrap();
        let scores = fit.candidates().map(|c| c.goodness_of_fit).collect::<Vec<_>>();
        assert!(scores.is_sorted_by(|a, b| a >= b), "{scores:?}");
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
        // every family applies to a positive, spread-out sample
        assert_eq!(scores.len(), DistributionFamily::ALL.len());
    }

    #[test]
    fn test_too_few_values() {
        let mut rng = Pcg32::seed_from_u64(0);
        let err = DistributionFitter::default()
            .fit_distribution("x", &[1.0, f64::NAN, 2.0, f64::INFINITY], &mut rng)
            .unwrap_err();
        assert!(matches!(
            err,
            FitError::InsufficientData {
                usable: 2,
                required: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_constant_sample_falls_back_to_uniform() {
        let mut rng = Pcg32::seed_from_u64(0);
        let fit = DistributionFitter::default()
            .fit_distribution("x", &[4.0; 20], &mut rng)
            .unwrap();
        assert!(
            fit.candidates()
                .all(|c| c.family != DistributionFamily::Normal)
        );
        let uniform = fit
            .candidates()
            .find(|c| c.family == DistributionFamily::Uniform)
            .unwrap();
        assert_eq!(uniform.goodness_of_fit, 0.5);
    }

    #[test]
    fn test_no_fittable_family_lists_rejections() {
        let mut rng = Pcg32::seed_from_u64(0);
        let fitter = DistributionFitter::new(FitterConfig {
            candidates: vec![DistributionFamily::Normal, DistributionFamily::Exponential],
            ..FitterConfig::default()
        });
        let err = fitter
            .fit_distribution("x", &[-3.0; 10], &mut rng)
            .unwrap_err();
        let FitError::NoFittableDistribution { rejections, .. } = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(rejections.len(), 2);
    }

    #[test]
    fn test_analytic_scoring_is_deterministic() {
        let mut rng = Pcg32::seed_from_u64(11);
        let values = normal_sample(&mut rng, 300);
        let fitter = DistributionFitter::new(FitterConfig {
            goodness_of_fit: GoodnessOfFit::Analytic,
            ..FitterConfig::default()
        });
        let a = fitter.fit_distribution("x", &values, &mut rng).unwrap();
        let b = fitter.fit_distribution("x", &values, &mut rng).unwrap();
        assert_eq!(a, b);
    }
}
