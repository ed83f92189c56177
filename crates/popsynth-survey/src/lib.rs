//! Survey ingestion and persona synthesis.
//!
//! Reads survey responses, learns a joint distribution over their fields
//! with [`popsynth_model`], and draws synthetic personas from it.
//!
//! # Pipeline
//!
//! ```text
//! CSV / JSON responses + schema
//!     ↓ SurveyDataset
//! structure check (fatal violations, warnings)
//!     ↓ SurveyAnalyzer
//! correlations + per-field fits + category frequencies
//!     ↓ JointDistributionModel
//! sample(n)
//!     ↓ PersonaGroup
//! ValidationResult against the original responses
//! ```
//!
//! # Modules
//!
//! - [`dataset`]: Responses, schema and metadata, with CSV and JSON readers
//! - [`structure`]: Schema conformance checks
//! - [`analyzer`]: Correlation analysis and model construction
//! - [`persona`]: Generated individuals and groups
//! - [`validation`]: Statistical comparison of generated and observed data
//! - [`pipeline`]: The seeded end-to-end driver
//! - [`config`]: Pipeline settings

pub mod analyzer;
pub mod config;
pub mod dataset;
pub mod error;
pub mod persona;
pub mod pipeline;
pub mod structure;
pub mod validation;

pub use self::error::{SchemaWarning, SurveyError, Violation};
