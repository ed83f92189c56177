//! Joint sampling of correlated marginals.
//!
//! A [`JointDistributionModel`] combines per-variable marginals with a target
//! correlation matrix and draws whole records at once. Dependence between the
//! numeric marginals is introduced in a latent standard-normal space:
//!
//! 1. draw `z ~ N(0, I)`,
//! 2. correlate it (see [`CopulaMixing`]),
//! 3. map each coordinate through the standard normal CDF to a uniform `u`,
//! 4. take the marginal's quantile at `u`.
//!
//! Categorical marginals are drawn independently of the latent vector.
//!
//! # Examples
//!
//! ```
//! use popsynth_model::{
//!     copula::{CopulaMixing, JointDistributionModel},
//!     family::FittedDistribution,
//!     marginal::MarginalDistribution,
//! };
//! use popsynth_stats::correlation::CorrelationMatrix;
//!
//! let normal = FittedDistribution::Normal { mean: 0.0, std_dev: 1.0 };
//! let marginals = vec![
//!     MarginalDistribution::new("a", normal).unwrap(),
//!     MarginalDistribution::new("b", normal).unwrap(),
//! ];
//! let correlation = CorrelationMatrix::identity(vec!["a".into(), "b".into()]);
//! let model = JointDistributionModel::new(marginals, correlation, CopulaMixing::Cholesky).unwrap();
//!
//! let samples = model.sample(10, &mut rand::rng());
//! assert_eq!(samples.len(), 10);
//! assert!(samples.iter().all(|s| s.number("a").is_some() && s.number("b").is_some()));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::{DMatrix, DVector};
use popsynth_stats::correlation::{CorrelationError, CorrelationMatrix};
use rand::Rng;
use rand_distr::{Distribution as _, StandardNormal};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF as _, Normal};

use crate::marginal::{CategoricalMarginal, MarginalDistribution, SampledValue};

/// Damping factor of [`CopulaMixing::DampedNudge`] when none is configured.
pub const LEGACY_DAMPING: f64 = 0.1;

/// Factor applied to off-diagonal correlations when the target matrix is not
/// positive definite.
pub const SHRINK_FACTOR: f64 = 0.9;

/// Maximum number of shrink steps before falling back to independence.
pub const MAX_SHRINK_STEPS: usize = 50;

/// Latent uniforms are kept inside `(UNIFORM_EPSILON, 1 - UNIFORM_EPSILON)`
/// so quantiles of unbounded families stay finite.
pub const UNIFORM_EPSILON: f64 = 1e-9;

/// How the latent normals are correlated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CopulaMixing {
    /// Gaussian copula: `x = L z` with `L` the Cholesky factor of the target.
    #[default]
    Cholesky,
    /// Each normal is nudged by `sum_{j != i} r_ij * damping * z_j`.
    ///
    /// Produces correlations with the right sign but much weaker magnitude.
    DampedNudge {
        #[serde(default = "default_damping")]
        damping: f64,
    },
}

fn default_damping() -> f64 {
    LEGACY_DAMPING
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CopulaError {
    #[display("variable '{variable}' is modelled more than once")]
    DuplicateVariable { variable: String },
    #[display("damping must be a finite, non-negative number, got {damping}")]
    InvalidDamping { damping: f64 },
    #[display("invalid correlation matrix")]
    Correlation { source: CorrelationError },
}

/// One generated record: variable name → sampled value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JointSample(BTreeMap<String, SampledValue>);

impl JointSample {
    #[must_use]
    pub fn get(&self, variable: &str) -> Option<&SampledValue> {
        self.0.get(variable)
    }

    /// Numeric value of `variable`, if present and numeric.
    #[must_use]
    pub fn number(&self, variable: &str) -> Option<f64> {
        self.get(variable).and_then(SampledValue::as_f64)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SampledValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, SampledValue> {
        self.0
    }
}

impl FromIterator<(String, SampledValue)> for JointSample {
    fn from_iter<T: IntoIterator<Item = (String, SampledValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Marginals plus a correlation structure; immutable once built.
#[derive(Debug, Clone)]
pub struct JointDistributionModel {
    marginals: Vec<MarginalDistribution>,
    categorical: Vec<CategoricalMarginal>,
    correlation: CorrelationMatrix,
    mixing: CopulaMixing,
    /// Target correlations restricted to `marginals`, in marginal order.
    target: DMatrix<f64>,
    /// Lower Cholesky factor of the (possibly shrunk) target.
    factor: DMatrix<f64>,
    effective: CorrelationMatrix,
}

impl JointDistributionModel {
    /// Builds a model over `marginals`.
    ///
    /// Pairs missing from `correlation` are treated as uncorrelated.
    pub fn new(
        marginals: Vec<MarginalDistribution>,
        correlation: CorrelationMatrix,
        mixing: CopulaMixing,
    ) -> Result<Self, CopulaError> {
        if let CopulaMixing::DampedNudge { damping } = mixing {
            if !(damping.is_finite() && damping >= 0.0) {
                return Err(CopulaError::InvalidDamping { damping });
            }
        }
        check_unique(marginals.iter().map(MarginalDistribution::variable))?;

        let variables = marginals
            .iter()
            .map(|m| m.variable().to_owned())
            .collect::<Vec<_>>();
        for variable in &variables {
            if correlation.index_of(variable).is_none() {
                log::warn!("{variable}: not in the correlation matrix, sampled independently");
            }
        }
        let target = restrict(&correlation, &variables);
        let factor = match mixing {
            CopulaMixing::Cholesky => factorize(&target),
            CopulaMixing::DampedNudge { .. } => DMatrix::identity(target.nrows(), target.ncols()),
        };
        let effective_matrix = match mixing {
            CopulaMixing::Cholesky => &factor * factor.transpose(),
            CopulaMixing::DampedNudge { .. } => target.clone(),
        };
        let effective = CorrelationMatrix::new(
            variables,
            to_rows(&effective_matrix),
            None,
            correlation.method(),
        )
        .map_err(|source| CopulaError::Correlation { source })?;

        Ok(Self {
            marginals,
            categorical: vec![],
            correlation,
            mixing,
            target,
            factor,
            effective,
        })
    }

    /// Adds independently sampled categorical marginals.
    pub fn with_categorical(
        mut self,
        categorical: Vec<CategoricalMarginal>,
    ) -> Result<Self, CopulaError> {
        check_unique(
            self.marginals
                .iter()
                .map(MarginalDistribution::variable)
                .chain(self.categorical.iter().map(CategoricalMarginal::variable))
                .chain(categorical.iter().map(CategoricalMarginal::variable)),
        )?;
        self.categorical.extend(categorical);
        Ok(self)
    }

    #[must_use]
    pub fn marginals(&self) -> &[MarginalDistribution] {
        &self.marginals
    }

    #[must_use]
    pub fn categorical(&self) -> &[CategoricalMarginal] {
        &self.categorical
    }

    #[must_use]
    pub fn mixing(&self) -> CopulaMixing {
        self.mixing
    }

    /// The target correlation matrix the model was built from.
    #[must_use]
    pub fn correlation_matrix(&self) -> &CorrelationMatrix {
        &self.correlation
    }

    /// Latent correlations actually used when sampling, over the numeric
    /// marginals.
    ///
    /// Differs from the target when the target had to be shrunk.
    #[must_use]
    pub fn effective_correlation(&self) -> &CorrelationMatrix {
        &self.effective
    }

    /// All modelled variable names, numeric first.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.marginals
            .iter()
            .map(MarginalDistribution::variable)
            .chain(self.categorical.iter().map(CategoricalMarginal::variable))
    }

    /// Draws exactly `count` records, each holding every modelled variable.
    pub fn sample<R>(&self, count: usize, rng: &mut R) -> Vec<JointSample>
    where
        R: Rng + ?Sized,
    {
        (0..count).map(|_| self.sample_one(rng)).collect()
    }

    /// Like [`Self::sample`], with numeric values mapped into `[0, 1]` by each
    /// marginal's transform.
    pub fn sample_normalized<R>(&self, count: usize, rng: &mut R) -> Vec<JointSample>
    where
        R: Rng + ?Sized,
    {
        self.sample(count, rng)
            .into_iter()
            .map(|sample| {
                sample
                    .into_inner()
                    .into_iter()
                    .map(|(variable, value)| {
                        let value = match (value, self.marginal(&variable)) {
                            (SampledValue::Number(n), Some(marginal)) => {
                                SampledValue::Number(marginal.normalize(n))
                            }
                            (value, _) => value,
                        };
                        (variable, value)
                    })
                    .collect()
            })
            .collect()
    }

    fn marginal(&self, variable: &str) -> Option<&MarginalDistribution> {
        self.marginals.iter().find(|m| m.variable() == variable)
    }

    fn sample_one<R>(&self, rng: &mut R) -> JointSample
    where
        R: Rng + ?Sized,
    {
        let n = self.marginals.len();
        let z = DVector::<f64>::from_fn(n, |_, _| StandardNormal.sample(rng));
        let latent = match self.mixing {
            CopulaMixing::Cholesky => &self.factor * &z,
            CopulaMixing::DampedNudge { damping } => DVector::from_fn(n, |i, _| {
                let nudge = (0..n)
                    .filter(|&j| j != i)
                    .map(|j| self.target[(i, j)] * damping * z[j])
                    .sum::<f64>();
                z[i] + nudge
            }),
        };

        let standard = Normal::standard();
        let numeric = self
            .marginals
            .iter()
            .zip(latent.iter())
            .map(|(marginal, x)| {
                let u = standard
                    .cdf(*x)
                    .clamp(UNIFORM_EPSILON, 1.0 - UNIFORM_EPSILON);
                (
                    marginal.variable().to_owned(),
                    SampledValue::Number(marginal.quantile(u)),
                )
            })
            .collect::<Vec<_>>();
        let categorical = self
            .categorical
            .iter()
            .map(|marginal| (marginal.variable().to_owned(), marginal.sample(rng)))
            .collect::<Vec<_>>();
        numeric.into_iter().chain(categorical).collect()
    }
}

fn check_unique<'a, I>(variables: I) -> Result<(), CopulaError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = BTreeSet::new();
    for variable in variables {
        if !seen.insert(variable) {
            return Err(CopulaError::DuplicateVariable {
                variable: variable.to_owned(),
            });
        }
    }
    Ok(())
}

fn restrict(correlation: &CorrelationMatrix, variables: &[String]) -> DMatrix<f64> {
    DMatrix::from_fn(variables.len(), variables.len(), |i, j| {
        if i == j {
            return 1.0;
        }
        correlation
            .get(&variables[i], &variables[j])
            .filter(|r| r.is_finite())
            .map_or(0.0, |r| r.clamp(-1.0, 1.0))
    })
}

/// Lower Cholesky factor of `target`, shrinking its off-diagonal entries
/// until it is positive definite.
fn factorize(target: &DMatrix<f64>) -> DMatrix<f64> {
    let mut matrix = target.clone();
    for step in 0..=MAX_SHRINK_STEPS {
        if let Some(cholesky) = matrix.clone().cholesky() {
            if step > 0 {
                log::warn!(
                    "correlation matrix is not positive definite, shrunk off-diagonals {step} time(s)"
                );
            }
            return cholesky.l();
        }
        matrix *= SHRINK_FACTOR;
        matrix.fill_diagonal(1.0);
    }
    log::warn!("correlation matrix could not be factorized, sampling marginals independently");
    DMatrix::identity(target.nrows(), target.ncols())
}

fn to_rows(matrix: &DMatrix<f64>) -> Vec<Vec<f64>> {
    matrix.row_iter().map(|row| row.iter().copied().collect()).collect()
}
