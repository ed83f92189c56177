//! Distribution families and their fitted instances.
//!
//! A [`DistributionFamily`] names one of the supported 1-D families and knows
//! how to estimate its parameters from a sample by the method of moments
//! ([`DistributionFamily::fit`]). The result is a [`FittedDistribution`],
//! a plain parameter record that can be compiled into:
//!
//! - a [`DistributionSampler`] (backed by `rand_distr`) to draw values, and
//! - an [`AnalyticDistribution`] (backed by `statrs`) to evaluate the CDF and
//!   its inverse.
//!
//! # Families
//!
//! | family        | parameters                       | precondition                          |
//! |---------------|----------------------------------|---------------------------------------|
//! | `normal`      | mean, std-dev                    | non-zero spread                       |
//! | `uniform`     | min, max                         | always (constant samples are widened) |
//! | `exponential` | rate                             | ≥ 80 % strictly positive values       |
//! | `beta`        | α, β on a `[lower, upper]` support | moments normalizable into (0, 1)    |
//! | `lognormal`   | μ, σ of the logged values        | ≥ 80 % strictly positive values       |
//!
//! # Examples
//!
//! ```
//! use popsynth_model::family::{DistributionFamily, FittedDistribution};
//!
//! let sample = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let fit = DistributionFamily::Uniform.fit(&sample).unwrap();
//! assert_eq!(fit.distribution, FittedDistribution::Uniform { min: 1.0, max: 5.0 });
//! assert_eq!(fit.distribution.mean(), 3.0);
//! ```

use std::collections::BTreeMap;

use popsynth_stats::descriptive::DescriptiveStats;
use rand::{Rng, distr::Uniform};
use rand_distr::{Beta, Distribution, Exp, LogNormal, Normal};
use serde::{Deserialize, Serialize};
use statrs::distribution::{self as analytic, ContinuousCDF as _};

/// Minimum share of strictly positive values required by the exponential and
/// log-normal families.
pub const MIN_POSITIVE_SHARE: f64 = 0.8;

/// Goodness-of-fit reported for a constant sample fitted by a widened uniform.
pub const DEGENERATE_UNIFORM_SCORE: f64 = 0.5;

/// Half-width, relative to `max(1, |value|)`, of the uniform fitted to a
/// constant sample.
pub const DEGENERATE_WIDTH: f64 = 1e-6;

/// A supported 1-D distribution family.
///
/// Parses from its name case-insensitively (`"lognormal"`, `"LogNormal"`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::FromStr,
)]
#[serde(rename_all = "lowercase")]
pub enum DistributionFamily {
    #[display("normal")]
    Normal,
    #[display("uniform")]
    Uniform,
    #[display("exponential")]
    Exponential,
    #[display("beta")]
    Beta,
    #[display("lognormal")]
    LogNormal,
}

impl DistributionFamily {
    /// Every family, in the default candidate order.
    pub const ALL: [Self; 5] = [
        Self::Normal,
        Self::Uniform,
        Self::Exponential,
        Self::Beta,
        Self::LogNormal,
    ];

    /// Estimates the family's parameters from a cleaned sample.
    ///
    /// `sample` must only contain finite values. Returns the reason the
    /// family does not apply when its precondition fails.
    pub fn fit(self, sample: &[f64]) -> Result<FamilyFit, FitRejection> {
        let stats = DescriptiveStats::new(sample.iter().copied()).ok_or(FitRejection::EmptySample)?;
        let fit = match self {
            Self::Normal => fit_normal(&stats)?,
            Self::Uniform => fit_uniform(&stats),
            Self::Exponential => fit_exponential(sample)?,
            Self::Beta => fit_beta(sample, &stats)?,
            Self::LogNormal => fit_log_normal(sample)?,
        };
        // cheap parameter check so every fit is guaranteed to compile
        fit.distribution.sampler()?;
        Ok(fit)
    }
}

/// Why a family could not be fitted to a sample.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum FitRejection {
    #[display("sample is empty")]
    EmptySample,
    #[display("sample has no spread")]
    NoSpread,
    #[display("only {:.0}% of values are strictly positive", share * 100.0)]
    TooFewPositive { share: f64 },
    #[display("normalized mean {mean} / variance {variance} outside the beta domain")]
    OutsideBetaDomain { mean: f64, variance: f64 },
    #[display("non-positive shape parameters (alpha = {alpha}, beta = {beta})")]
    NonPositiveShape { alpha: f64, beta: f64 },
    #[display("invalid parameters for {family}: {detail}")]
    InvalidParameters {
        family: DistributionFamily,
        detail: String,
    },
}

/// Result of fitting a single family.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyFit {
    pub distribution: FittedDistribution,
    /// A goodness-of-fit imposed by the family instead of a computed one.
    pub fixed_score: Option<f64>,
}

impl From<FittedDistribution> for FamilyFit {
    fn from(distribution: FittedDistribution) -> Self {
        Self {
            distribution,
            fixed_score: None,
        }
    }
}

fn fit_normal(stats: &DescriptiveStats) -> Result<FamilyFit, FitRejection> {
    let std_dev = stats.sample_std_dev();
    if stats.range() == 0.0 || std_dev <= 0.0 {
        return Err(FitRejection::NoSpread);
    }
    Ok(FittedDistribution::Normal {
        mean: stats.mean,
        std_dev,
    }
    .into())
}

fn fit_uniform(stats: &DescriptiveStats) -> FamilyFit {
    if stats.range() == 0.0 {
        let epsilon = DEGENERATE_WIDTH * stats.min.abs().max(1.0);
        return FamilyFit {
            distribution: FittedDistribution::Uniform {
                min: stats.min - epsilon,
                max: stats.max + epsilon,
            },
            fixed_score: Some(DEGENERATE_UNIFORM_SCORE),
        };
    }
    FittedDistribution::Uniform {
        min: stats.min,
        max: stats.max,
    }
    .into()
}

fn positive_subset(sample: &[f64]) -> Result<Vec<f64>, FitRejection> {
    let positive = sample.iter().copied().filter(|v| *v > 0.0).collect::<Vec<_>>();
    #[expect(clippy::cast_precision_loss)]
    let share = positive.len() as f64 / sample.len() as f64;
    if share < MIN_POSITIVE_SHARE {
        return Err(FitRejection::TooFewPositive { share });
    }
    Ok(positive)
}

fn fit_exponential(sample: &[f64]) -> Result<FamilyFit, FitRejection> {
    let positive = positive_subset(sample)?;
    let stats = DescriptiveStats::new(positive).ok_or(FitRejection::EmptySample)?;
    Ok(FittedDistribution::Exponential {
        rate: 1.0 / stats.mean,
    }
    .into())
}

fn fit_beta(sample: &[f64], stats: &DescriptiveStats) -> Result<FamilyFit, FitRejection> {
    let (lower, upper) = if stats.min >= 0.0 && stats.max <= 1.0 {
        (0.0, 1.0)
    } else {
        (stats.min, stats.max)
    };
    let width = upper - lower;
    if width <= 0.0 {
        return Err(FitRejection::NoSpread);
    }
    let normalized = DescriptiveStats::new(sample.iter().map(|v| (v - lower) / width))
        .ok_or(FitRejection::EmptySample)?;
    let mean = normalized.mean;
    let variance = normalized.sample_std_dev().powi(2);
    if !(mean > 0.0 && mean < 1.0 && variance > 0.0) {
        return Err(FitRejection::OutsideBetaDomain { mean, variance });
    }
    let common = mean * (1.0 - mean) / variance - 1.0;
    let alpha = mean * common;
    let beta = (1.0 - mean) * common;
    if !(alpha > 0.0 && beta > 0.0) {
        return Err(FitRejection::NonPositiveShape { alpha, beta });
    }
    Ok(FittedDistribution::Beta {
        alpha,
        beta,
        lower,
        upper,
    }
    .into())
}

fn fit_log_normal(sample: &[f64]) -> Result<FamilyFit, FitRejection> {
    let positive = positive_subset(sample)?;
    let logs = DescriptiveStats::new(positive.iter().map(|v| v.ln())).ok_or(FitRejection::EmptySample)?;
    let sigma = logs.sample_std_dev();
    if logs.range() == 0.0 || sigma <= 0.0 {
        return Err(FitRejection::NoSpread);
    }
    Ok(FittedDistribution::LogNormal {
        mu: logs.mean,
        sigma,
    }
    .into())
}

/// Parameters of a fitted 1-D distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "family",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum FittedDistribution {
    Normal { mean: f64, std_dev: f64 },
    Uniform { min: f64, max: f64 },
    Exponential { rate: f64 },
    /// Beta distribution scaled onto `[lower, upper]`.
    Beta {
        alpha: f64,
        beta: f64,
        lower: f64,
        upper: f64,
    },
    /// Log-normal with `mu` and `sigma` of the underlying normal.
    LogNormal { mu: f64, sigma: f64 },
}

impl FittedDistribution {
    #[must_use]
    pub fn family(&self) -> DistributionFamily {
        match self {
            Self::Normal { .. } => DistributionFamily::Normal,
            Self::Uniform { .. } => DistributionFamily::Uniform,
            Self::Exponential { .. } => DistributionFamily::Exponential,
            Self::Beta { .. } => DistributionFamily::Beta,
            Self::LogNormal { .. } => DistributionFamily::LogNormal,
        }
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        match *self {
            Self::Normal { mean, .. } => mean,
            Self::Uniform { min, max } => f64::midpoint(min, max),
            Self::Exponential { rate } => 1.0 / rate,
            Self::Beta {
                alpha,
                beta,
                lower,
                upper,
            } => lower + (upper - lower) * alpha / (alpha + beta),
            Self::LogNormal { mu, sigma } => (mu + sigma * sigma / 2.0).exp(),
        }
    }

    #[must_use]
    pub fn variance(&self) -> f64 {
        match *self {
            Self::Normal { std_dev, .. } => std_dev * std_dev,
            Self::Uniform { min, max } => (max - min).powi(2) / 12.0,
            Self::Exponential { rate } => 1.0 / (rate * rate),
            Self::Beta {
                alpha,
                beta,
                lower,
                upper,
            } => {
                let sum = alpha + beta;
                (upper - lower).powi(2) * alpha * beta / (sum * sum * (sum + 1.0))
            }
            Self::LogNormal { mu, sigma } => {
                let s2 = sigma * sigma;
                (s2.exp() - 1.0) * (2.0 * mu + s2).exp()
            }
        }
    }

    /// Named parameters, for reporting.
    #[must_use]
    pub fn parameters(&self) -> BTreeMap<String, f64> {
        let pairs: &[(&str, f64)] = match *self {
            Self::Normal { mean, std_dev } => &[("mean", mean), ("stdDev", std_dev)],
            Self::Uniform { min, max } => &[("min", min), ("max", max)],
            Self::Exponential { rate } => &[("rate", rate)],
            Self::Beta {
                alpha,
                beta,
                lower,
                upper,
            } => &[
                ("alpha", alpha),
                ("beta", beta),
                ("lower", lower),
                ("upper", upper),
            ],
            Self::LogNormal { mu, sigma } => &[("mu", mu), ("sigma", sigma)],
        };
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), *value))
            .collect()
    }

    /// Builds a sampler for this distribution.
    pub fn sampler(&self) -> Result<DistributionSampler, FitRejection> {
        let invalid = |detail: String| FitRejection::InvalidParameters {
            family: self.family(),
            detail,
        };
        let kind = match *self {
            Self::Normal { mean, std_dev } => {
                SamplerKind::Normal(Normal::new(mean, std_dev).map_err(|e| invalid(e.to_string()))?)
            }
            Self::Uniform { min, max } => {
                SamplerKind::Uniform(Uniform::new(min, max).map_err(|e| invalid(e.to_string()))?)
            }
            Self::Exponential { rate } => {
                SamplerKind::Exponential(Exp::new(rate).map_err(|e| invalid(e.to_string()))?)
            }
            Self::Beta {
                alpha,
                beta,
                lower,
                upper,
            } => SamplerKind::Beta {
                dist: Beta::new(alpha, beta).map_err(|e| invalid(e.to_string()))?,
                lower,
                width: upper - lower,
            },
            Self::LogNormal { mu, sigma } => {
                SamplerKind::LogNormal(LogNormal::new(mu, sigma).map_err(|e| invalid(e.to_string()))?)
            }
        };
        Ok(DistributionSampler(kind))
    }

    /// Builds the closed-form CDF / quantile evaluator for this distribution.
    pub fn analytic(&self) -> Result<AnalyticDistribution, FitRejection> {
        let invalid = |detail: String| FitRejection::InvalidParameters {
            family: self.family(),
            detail,
        };
        let kind = match *self {
            Self::Normal { mean, std_dev } => AnalyticKind::Normal(
                analytic::Normal::new(mean, std_dev).map_err(|e| invalid(e.to_string()))?,
            ),
            Self::Uniform { min, max } => AnalyticKind::Uniform(
                analytic::Uniform::new(min, max).map_err(|e| invalid(e.to_string()))?,
            ),
            Self::Exponential { rate } => AnalyticKind::Exponential(
                analytic::Exp::new(rate).map_err(|e| invalid(e.to_string()))?,
            ),
            Self::Beta {
                alpha,
                beta,
                lower,
                upper,
            } => AnalyticKind::Beta {
                dist: analytic::Beta::new(alpha, beta).map_err(|e| invalid(e.to_string()))?,
                lower,
                width: upper - lower,
            },
            Self::LogNormal { mu, sigma } => AnalyticKind::LogNormal(
                analytic::LogNormal::new(mu, sigma).map_err(|e| invalid(e.to_string()))?,
            ),
        };
        Ok(AnalyticDistribution(kind))
    }
}

/// Draws values from a [`FittedDistribution`].
#[derive(Debug, Clone)]
pub struct DistributionSampler(SamplerKind);

#[derive(Debug, Clone)]
enum SamplerKind {
    Normal(Normal<f64>),
    Uniform(Uniform<f64>),
    Exponential(Exp<f64>),
    Beta {
        dist: Beta<f64>,
        lower: f64,
        width: f64,
    },
    LogNormal(LogNormal<f64>),
}

impl Distribution<f64> for DistributionSampler {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.0 {
            SamplerKind::Normal(dist) => dist.sample(rng),
            SamplerKind::Uniform(dist) => dist.sample(rng),
            SamplerKind::Exponential(dist) => dist.sample(rng),
            SamplerKind::Beta { dist, lower, width } => lower + width * dist.sample(rng),
            SamplerKind::LogNormal(dist) => dist.sample(rng),
        }
    }
}

/// Closed-form CDF and quantile function of a [`FittedDistribution`].
#[derive(Debug, Clone)]
pub struct AnalyticDistribution(AnalyticKind);

#[derive(Debug, Clone)]
enum AnalyticKind {
    Normal(analytic::Normal),
    Uniform(analytic::Uniform),
    Exponential(analytic::Exp),
    Beta {
        dist: analytic::Beta,
        lower: f64,
        width: f64,
    },
    LogNormal(analytic::LogNormal),
}

impl AnalyticDistribution {
    #[must_use]
    pub fn cdf(&self, x: f64) -> f64 {
        match &self.0 {
            AnalyticKind::Normal(dist) => dist.cdf(x),
            AnalyticKind::Uniform(dist) => dist.cdf(x),
            AnalyticKind::Exponential(dist) => dist.cdf(x),
            AnalyticKind::Beta { dist, lower, width } => {
                dist.cdf(((x - lower) / width).clamp(0.0, 1.0))
            }
            AnalyticKind::LogNormal(dist) => dist.cdf(x),
        }
    }

    /// Inverse CDF; `p` is clamped into `[0, 1]`.
    #[must_use]
    pub fn quantile(&self, p: f64) -> f64 {
        let p = p.clamp(0.0, 1.0);
        match &self.0 {
            AnalyticKind::Normal(dist) => dist.inverse_cdf(p),
            AnalyticKind::Uniform(dist) => dist.inverse_cdf(p),
            AnalyticKind::Exponential(dist) => dist.inverse_cdf(p),
            AnalyticKind::Beta { dist, lower, width } => lower + width * dist.inverse_cdf(p),
            AnalyticKind::LogNormal(dist) => dist.inverse_cdf(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    #[test]
    fn test_family_names_round_trip() {
        for family in DistributionFamily::ALL {
            assert_eq!(family.to_string().parse::<DistributionFamily>().unwrap(), family);
        }
        assert_eq!(
            "LogNormal".parse::<DistributionFamily>().unwrap(),
            DistributionFamily::LogNormal
        );
        assert_eq!(DistributionFamily::LogNormal.to_string(), "lognormal");
        assert!("gamma".parse::<DistributionFamily>().is_err());
    }

    #[test]
    fn test_constant_sample_rejects_normal() {
        let sample = [7.0; 12];
        assert_eq!(
            DistributionFamily::Normal.fit(&sample).unwrap_err(),
            FitRejection::NoSpread
        );
    }

    #[test]
    fn test_constant_sample_gives_degenerate_uniform() {
        let sample = [7.0; 12];
        let fit = DistributionFamily::Uniform.fit(&sample).unwrap();
        assert_eq!(fit.fixed_score, Some(DEGENERATE_UNIFORM_SCORE));
        let FittedDistribution::Uniform { min, max } = fit.distribution else {
            panic!("expected uniform, got {:?}", fit.distribution);
        };
        assert!(min < 7.0 && 7.0 < max);
    }

    #[test]
    fn test_exponential_needs_positive_values() {
        let sample = [-1.0, -2.0, 3.0, 4.0, 5.0];
        assert!(matches!(
            DistributionFamily::Exponential.fit(&sample),
            Err(FitRejection::TooFewPositive { .. })
        ));
        assert!(matches!(
            DistributionFamily::LogNormal.fit(&sample),
            Err(FitRejection::TooFewPositive { .. })
        ));
    }

    #[test]
    fn test_exponential_rate_from_positive_subset() {
        // 4 of 5 positive is exactly the 80 % threshold
        let sample = [0.0, 1.0, 2.0, 3.0, 2.0];
        let fit = DistributionFamily::Exponential.fit(&sample).unwrap();
        assert_eq!(fit.distribution, FittedDistribution::Exponential { rate: 0.5 });
    }

    #[test]
    fn test_beta_on_unit_interval_keeps_support() {
        let sample = [0.2, 0.3, 0.4, 0.5, 0.6];
        let fit = DistributionFamily::Beta.fit(&sample).unwrap();
        let FittedDistribution::Beta {
            alpha,
            beta,
            lower,
            upper,
        } = fit.distribution
        else {
            panic!("expected beta");
        };
        assert_eq!((lower, upper), (0.0, 1.0));
        // symmetric around 0.4 → alpha / (alpha + beta) = 0.4
        assert!((alpha / (alpha + beta) - 0.4).abs() < 1e-9);
        assert!((fit.distribution.mean() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_beta_scales_wider_ranges() {
        let sample = [10.0, 20.0, 25.0, 30.0, 50.0];
        let fit = DistributionFamily::Beta.fit(&sample).unwrap();
        assert!(matches!(
            fit.distribution,
            FittedDistribution::Beta { lower, upper, .. } if lower == 10.0 && upper == 50.0
        ));
        assert!((fit.distribution.mean() - 27.0).abs() < 1e-9);
    }

    #[test]
    fn test_log_normal_fits_logs() {
        let sample = [1.0, std::f64::consts::E, std::f64::consts::E.powi(2)];
        let fit = DistributionFamily::LogNormal.fit(&sample).unwrap();
        let FittedDistribution::LogNormal { mu, sigma } = fit.distribution else {
            panic!("expected lognormal");
        };
        assert!((mu - 1.0).abs() < 1e-12);
        assert!((sigma - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_moments() {
        let uniform = FittedDistribution::Uniform { min: 0.0, max: 6.0 };
        assert_eq!(uniform.mean(), 3.0);
        assert_eq!(uniform.variance(), 3.0);
        let exp = FittedDistribution::Exponential { rate: 2.0 };
        assert_eq!(exp.mean(), 0.5);
        assert_eq!(exp.variance(), 0.25);
    }

    #[test]
    fn test_invalid_parameters_are_reported() {
        let bad = FittedDistribution::Normal {
            mean: 0.0,
            std_dev: -1.0,
        };
        assert!(matches!(
            bad.sampler(),
            Err(FitRejection::InvalidParameters { family: DistributionFamily::Normal, .. })
        ));
        assert!(bad.analytic().is_err());
    }

    #[test]
    fn test_quantile_inverts_cdf() {
        let distributions = [
            FittedDistribution::Normal {
                mean: 50.0,
                std_dev: 10.0,
            },
            FittedDistribution::Uniform {
                min: -2.0,
                max: 3.0,
            },
            FittedDistribution::Exponential { rate: 0.5 },
            FittedDistribution::Beta {
                alpha: 2.0,
                beta: 5.0,
                lower: 10.0,
                upper: 20.0,
            },
            FittedDistribution::LogNormal {
                mu: 1.0,
                sigma: 0.5,
            },
        ];
        for distribution in distributions {
            let analytic = distribution.analytic().unwrap();
            for p in [0.1, 0.5, 0.9] {
                let x = analytic.quantile(p);
                assert!(
                    (analytic.cdf(x) - p).abs() < 1e-4,
                    "{distribution:?} at p = {p}"
                );
            }
        }
    }

    #[test]
    fn test_sampler_mean_close_to_analytic_mean() {
        let mut rng = Pcg32::seed_from_u64(7);
        let distribution = FittedDistribution::Beta {
            alpha: 2.0,
            beta: 3.0,
            lower: 0.0,
            upper: 100.0,
        };
        let sampler = distribution.sampler().unwrap();
        let mean = (0..10_000).map(|_| sampler.sample(&mut rng)).sum::<f64>() / 10_000.0;
        assert!((mean - distribution.mean()).abs() < 1.5);
    }

    #[test]
    fn test_serde_shape() {
        let distribution = FittedDistribution::Normal {
            mean: 1.0,
            std_dev: 2.0,
        };
        let json = serde_json::to_value(distribution).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"family": "normal", "mean": 1.0, "stdDev": 2.0})
        );
        let log_normal = serde_json::to_value(FittedDistribution::LogNormal { mu: 0.0, sigma: 1.0 })
            .unwrap();
        assert_eq!(log_normal["family"], "lognormal");
    }
}
