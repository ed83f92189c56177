//! Distribution modelling for synthetic population generation.
//!
//! This crate turns observed numeric columns into a sampleable joint model:
//!
//! 1. **Fitting** - each column is fitted by several parametric families and
//!    the candidates are ranked by a Kolmogorov–Smirnov goodness-of-fit
//! 2. **Marginals** - the best fit of each column becomes a marginal, with a
//!    min–max transform onto `[0, 1]`; categorical columns become frequency
//!    tables
//! 3. **Joint sampling** - marginals are tied together by a Gaussian copula
//!    built from the observed correlation matrix
//!
//! # Architecture
//!
//! ```text
//! observed column
//!     ↓ fitted by
//! DistributionFitter (family registry)
//!     ↓ best fit
//! MarginalDistribution / CategoricalMarginal
//!     ↓ combined with CorrelationMatrix
//! JointDistributionModel
//!     ↓ sample(n)
//! JointSample records
//! ```
//!
//! # Modules
//!
//! - [`family`]: Supported families, parameter estimation, sampling and CDFs
//! - [`fitter`]: Candidate scoring and ranking
//! - [`marginal`]: Per-variable marginals and value transforms
//! - [`copula`]: Joint sampling with correlated latent normals
//! - [`seed`]: Reproducible generator seeds
//!
//! # Randomness
//!
//! Every operation that draws random numbers takes the generator as a
//! `&mut R where R: Rng + ?Sized` argument; nothing holds global state.
//! Use [`seed::GenerationSeed`] to obtain reproducible [`rand_pcg::Pcg32`]
//! streams.

pub mod copula;
pub mod family;
pub mod fitter;
pub mod marginal;
pub mod seed;

pub use self::fitter::FitError;
