//! Per-variable marginal distributions.
//!
//! Numeric variables are modelled by a [`MarginalDistribution`] wrapping a
//! [`FittedDistribution`] and an optional [`MinMaxTransform`] between the
//! native value scale and `[0, 1]`. Categorical variables are modelled by an
//! empirical frequency table ([`CategoricalMarginal`]).

use std::collections::BTreeMap;

use rand::{
    Rng,
    distr::{Distribution, weighted::WeightedIndex},
};
use serde::{Deserialize, Serialize};

use crate::family::{AnalyticDistribution, DistributionSampler, FitRejection, FittedDistribution};

/// Linear map from `[min, max]` onto `[0, 1]`.
///
/// # Examples
///
/// ```
/// use popsynth_model::marginal::MinMaxTransform;
///
/// let t = MinMaxTransform::from_values([18.0, 30.0, 68.0]).unwrap();
/// assert_eq!(t.transform(43.0), 0.5);
/// assert_eq!(t.inverse(0.5), 43.0);
/// // values outside the observed range saturate
/// assert_eq!(t.transform(100.0), 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxTransform {
    pub min: f64,
    pub max: f64,
}

impl MinMaxTransform {
    /// Builds the transform over the finite values of `values`.
    ///
    /// Returns `None` when there is no finite value.
    #[must_use]
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some(Self { min: v, max: v }),
                Some(Self { min, max }) => Some(Self {
                    min: min.min(v),
                    max: max.max(v),
                }),
            })
    }

    /// Maps a native value into `[0, 1]`; a zero-width range maps to `0.5`.
    #[must_use]
    pub fn transform(&self, value: f64) -> f64 {
        let width = self.max - self.min;
        if width == 0.0 {
            return 0.5;
        }
        ((value - self.min) / width).clamp(0.0, 1.0)
    }

    /// Maps a normalized value back onto `[min, max]`.
    #[must_use]
    pub fn inverse(&self, normalized: f64) -> f64 {
        self.min + normalized.clamp(0.0, 1.0) * (self.max - self.min)
    }
}

/// Fitted marginal distribution of one numeric variable.
#[derive(Debug, Clone)]
pub struct MarginalDistribution {
    variable: String,
    distribution: FittedDistribution,
    transform: Option<MinMaxTransform>,
    sampler: DistributionSampler,
    analytic: AnalyticDistribution,
}

impl MarginalDistribution {
    pub fn new(
        variable: impl Into<String>,
        distribution: FittedDistribution,
    ) -> Result<Self, FitRejection> {
        Ok(Self {
            variable: variable.into(),
            sampler: distribution.sampler()?,
            analytic: distribution.analytic()?,
            distribution,
            transform: None,
        })
    }

    #[must_use]
    pub fn with_transform(self, transform: MinMaxTransform) -> Self {
        Self {
            transform: Some(transform),
            ..self
        }
    }

    #[must_use]
    pub fn variable(&self) -> &str {
        &self.variable
    }

    #[must_use]
    pub fn distribution(&self) -> &FittedDistribution {
        &self.distribution
    }

    #[must_use]
    pub fn transform(&self) -> Option<&MinMaxTransform> {
        self.transform.as_ref()
    }

    #[must_use]
    pub fn parameters(&self) -> BTreeMap<String, f64> {
        self.distribution.parameters()
    }

    /// Draws an independent value on the native scale.
    pub fn sample<R>(&self, rng: &mut R) -> f64
    where
        R: Rng + ?Sized,
    {
        self.sampler.sample(rng)
    }

    #[must_use]
    pub fn cdf(&self, value: f64) -> f64 {
        self.analytic.cdf(value)
    }

    #[must_use]
    pub fn quantile(&self, p: f64) -> f64 {
        self.analytic.quantile(p)
    }

    /// Native value → `[0, 1]`. Identity without a transform.
    #[must_use]
    pub fn normalize(&self, value: f64) -> f64 {
        self.transform.map_or(value, |t| t.transform(value))
    }

    /// `[0, 1]` → native value. Identity without a transform.
    #[must_use]
    pub fn denormalize(&self, normalized: f64) -> f64 {
        self.transform.map_or(normalized, |t| t.inverse(normalized))
    }
}

/// A single sampled attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampledValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl SampledValue {
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }
}

/// Empirical frequency table of a categorical variable.
///
/// Levels observed fewer than `min_count` times are dropped, so rare free-text
/// answers never reappear in generated records.
///
/// # Examples
///
/// ```
/// use popsynth_model::marginal::{CategoricalMarginal, SampledValue};
///
/// let counts = [
///     (SampledValue::Text("north".into()), 30),
///     (SampledValue::Text("south".into()), 10),
///     (SampledValue::Text("my street".into()), 1),
/// ];
/// let marginal = CategoricalMarginal::from_counts("region", counts, 2).unwrap();
/// assert_eq!(marginal.levels().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct CategoricalMarginal {
    variable: String,
    levels: Vec<(SampledValue, u64)>,
    index: WeightedIndex<u64>,
}

impl CategoricalMarginal {
    /// Builds the table from `(level, count)` pairs.
    ///
    /// Returns `None` when no level reaches `min_count`.
    pub fn from_counts<I>(variable: impl Into<String>, counts: I, min_count: u64) -> Option<Self>
    where
        I: IntoIterator<Item = (SampledValue, u64)>,
    {
        let variable = variable.into();
        let min_count = min_count.max(1);
        let (levels, dropped): (Vec<_>, Vec<_>) = counts
            .into_iter()
            .partition(|(_, count)| *count >= min_count);
        if !dropped.is_empty() {
            log::debug!(
                "{variable}: dropped {} level(s) seen fewer than {min_count} times",
                dropped.len()
            );
        }
        let index = WeightedIndex::new(levels.iter().map(|(_, count)| *count)).ok()?;
        Some(Self {
            variable,
            levels,
            index,
        })
    }

    #[must_use]
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Retained levels with their observed counts.
    #[must_use]
    pub fn levels(&self) -> &[(SampledValue, u64)] {
        &self.levels
    }

    pub fn sample<R>(&self, rng: &mut R) -> SampledValue
    where
        R: Rng + ?Sized,
    {
        self.levels[self.index.sample(rng)].0.clone()
    }
}
