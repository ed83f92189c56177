//! Statistical building blocks for the popsynth workspace.
//!
//! This crate provides:
//!
//! - **Descriptive statistics**: mean, median, variance, standard deviation, range
//! - **Percentiles**: linearly interpolated percentiles
//! - **Summary statistics**: descriptive statistics paired with percentiles
//! - **Kolmogorov–Smirnov distances**: one- and two-sample KS statistics
//! - **Correlation analysis**: Pearson, Spearman and mutual-information matrices
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`percentiles`]: Percentile computation and storage
//! - [`summary`]: Combined descriptive statistics and percentiles
//! - [`ks`]: Distances between empirical and reference distributions
//! - [`correlation`]: Pairwise association matrices over named columns
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use popsynth_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```
//!
//! ## Comparing two samples
//!
//! ```
//! use popsynth_stats::ks;
//!
//! let observed = [1.0, 2.0, 3.0, 4.0];
//! let generated = [1.5, 2.5, 3.5, 4.5];
//! let d = ks::two_sample_statistic(&observed, &generated);
//! assert!((d - 0.25).abs() < 1e-12);
//! ```

pub mod correlation;
pub mod descriptive;
pub mod ks;
pub mod percentiles;
pub mod summary;
