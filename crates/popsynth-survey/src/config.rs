use popsynth_model::{
    copula::CopulaMixing,
    family::DistributionFamily,
    fitter::{DEFAULT_MONTE_CARLO_DRAWS, FitterConfig, GoodnessOfFit},
    seed::GenerationSeed,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_GROUP_NAME: &str = "Survey Generated Population";

/// Pipeline settings, usually read from a JSON file.
///
/// Every field is optional on the wire.
///
/// # Examples
///
/// ```
/// use popsynth_survey::config::PipelineConfig;
///
/// let config: PipelineConfig = serde_json::from_str(
///     r#"{ "distributionCandidates": ["normal", "lognormal"], "copulaMixing": { "dampedNudge": {} } }"#,
/// )
/// .unwrap();
/// assert_eq!(config.distribution_candidates.len(), 2);
/// assert_eq!(config.min_fit_samples, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct PipelineConfig {
    /// Pairs below this absolute correlation are not reported as notable.
    pub min_correlation: f64,
    pub distribution_candidates: Vec<DistributionFamily>,
    pub monte_carlo_draws: usize,
    pub goodness_of_fit: GoodnessOfFit,
    /// Numeric fields with fewer usable values are not fitted.
    pub min_fit_samples: usize,
    pub copula_mixing: CopulaMixing,
    /// Model categorical and boolean fields by their observed frequencies.
    pub include_categorical: bool,
    /// Categories seen fewer times are never generated.
    pub min_category_count: u64,
    pub group_name: String,
    /// Fixed seed for reproducible runs; random when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<GenerationSeed>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_correlation: 0.1,
            distribution_candidates: DistributionFamily::ALL.to_vec(),
            monte_carlo_draws: DEFAULT_MONTE_CARLO_DRAWS,
            goodness_of_fit: GoodnessOfFit::default(),
            min_fit_samples: 10,
            copula_mixing: CopulaMixing::default(),
            include_categorical: true,
            min_category_count: 2,
            group_name: DEFAULT_GROUP_NAME.to_owned(),
            seed: None,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn fitter_config(&self) -> FitterConfig {
        FitterConfig {
            candidates: self.distribution_candidates.clone(),
            monte_carlo_draws: self.monte_carlo_draws,
            goodness_of_fit: self.goodness_of_fit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_full_config() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{
                "minCorrelation": 0.3,
                "goodnessOfFit": "analytic",
                "copulaMixing": { "dampedNudge": { "damping": 0.2 } },
                "includeCategorical": false,
                "seed": "000000000000000000000000000000ff"
            }"#,
        )
        .unwrap();
        assert_eq!(config.min_correlation, 0.3);
        assert_eq!(config.goodness_of_fit, GoodnessOfFit::Analytic);
        assert_eq!(config.copula_mixing, CopulaMixing::DampedNudge { damping: 0.2 });
        assert!(!config.include_categorical);
        assert_eq!(config.seed, Some(GenerationSeed::from(255_u64)));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(serde_json::from_str::<PipelineConfig>(r#"{"minCorrelaton": 0.2}"#).is_err());
    }
}
