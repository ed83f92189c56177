//! Per-dataset analysis: correlations, marginal fits, joint model, validation.

use std::collections::BTreeMap;

use popsynth_model::{
    FitError,
    copula::JointDistributionModel,
    fitter::{DistributionFit, DistributionFitter},
    marginal::{CategoricalMarginal, MarginalDistribution, MinMaxTransform, SampledValue},
};
use popsynth_stats::correlation::{CorrelationAnalyzer, CorrelationMatrix};
use rand::Rng;

use crate::{
    SurveyError,
    config::PipelineConfig,
    dataset::{self, FieldType, Response, SurveyDataset, Value},
    validation::ValidationResult,
};

/// Minimum number of numeric fields needed for a correlation matrix.
pub const MIN_CORRELATION_FIELDS: usize = 2;

/// Turns a [`SurveyDataset`] into a [`JointDistributionModel`] and judges how
/// closely generated records match it.
///
/// Holds only configuration; every call works on its own data.
#[derive(Debug, Clone)]
pub struct SurveyAnalyzer {
    config: PipelineConfig,
    correlations: CorrelationAnalyzer,
    fitter: DistributionFitter,
}

impl Default for SurveyAnalyzer {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl SurveyAnalyzer {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let fitter = DistributionFitter::new(config.fitter_config());
        Self {
            config,
            correlations: CorrelationAnalyzer::new(),
            fitter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Pearson correlations between the schema's numeric fields.
    pub fn analyze_correlations(
        &self,
        dataset: &SurveyDataset,
    ) -> Result<CorrelationMatrix, SurveyError> {
        let variables = dataset.schema().numeric_fields();
        if variables.len() < MIN_CORRELATION_FIELDS {
            return Err(SurveyError::InsufficientData {
                detail: format!(
                    "{} numeric field(s), at least {MIN_CORRELATION_FIELDS} needed for correlations",
                    variables.len()
                ),
            });
        }
        let columns = variables
            .iter()
            .map(|field| dataset.numeric_column(field))
            .collect::<Vec<_>>();
        let matrix = self
            .correlations
            .calculate_correlations(&variables, &columns, self.config.min_correlation)
            .map_err(|source| SurveyError::Correlation { source })?;
        for pair in matrix.notable_pairs(self.config.min_correlation) {
            log::info!(
                "notable correlation {}~{}: {:.3}",
                pair.first,
                pair.second,
                pair.value
            );
        }
        Ok(matrix)
    }

    /// One fit per numeric field with enough usable values.
    ///
    /// Fields that are too sparse or that no family fits are left out.
    pub fn detect_distributions<R>(
        &self,
        dataset: &SurveyDataset,
        rng: &mut R,
    ) -> Vec<DistributionFit>
    where
        R: Rng + ?Sized,
    {
        self.fit_numeric_fields(dataset, rng).fits
    }

    fn fit_numeric_fields<R>(&self, dataset: &SurveyDataset, rng: &mut R) -> FieldFits
    where
        R: Rng + ?Sized,
    {
        let mut result = FieldFits::default();
        for field in dataset.schema().fields_of(FieldType::Numeric) {
            let values = dataset.numeric_values(field);
            if values.len() < self.config.min_fit_samples {
                log::debug!(
                    "{field}: {} usable values, skipping fit (needs {})",
                    values.len(),
                    self.config.min_fit_samples
                );
                result.sparse.push(field.to_owned());
                continue;
            }
            match self.fitter.fit_distribution(field, &values, rng) {
                Ok(fit) => {
                    log::debug!(
                        "{field}: best fit {} ({:.3})",
                        fit.best_fit.family,
                        fit.best_fit.goodness_of_fit
                    );
                    result.fits.push(fit);
                }
                Err(err @ FitError::NoFittableDistribution { .. }) => {
                    log::warn!("{field}: {err}, excluded from the model");
                    result.unfittable.push(field.to_owned());
                }
                Err(err @ FitError::InsufficientData { .. }) => {
                    log::debug!("{field}: {err}");
                    result.sparse.push(field.to_owned());
                }
            }
        }
        result
    }

    /// Runs both analyses and assembles the joint model.
    pub fn build_joint_distribution<R>(
        &self,
        dataset: &SurveyDataset,
        rng: &mut R,
    ) -> Result<JointDistributionModel, SurveyError>
    where
        R: Rng + ?Sized,
    {
        let correlation = self.analyze_correlations(dataset)?;
        let FieldFits {
            fits,
            sparse,
            unfittable,
        } = self.fit_numeric_fields(dataset, rng);
        if fits.is_empty() {
            if unfittable.is_empty() {
                return Err(SurveyError::InsufficientData {
                    detail: format!(
                        "no numeric field has at least {} usable values ({})",
                        self.config.min_fit_samples,
                        sparse.join(", ")
                    ),
                });
            }
            return Err(SurveyError::NoFittableDistribution { fields: unfittable });
        }

        let mut marginals = vec![];
        for fit in &fits {
            let marginal = MarginalDistribution::new(&fit.variable, fit.best_fit.distribution)
                .map_err(|rejection| {
                    log::warn!("{}: {rejection}", fit.variable);
                    SurveyError::NoFittableDistribution {
                        fields: vec![fit.variable.clone()],
                    }
                })?;
            let marginal = match MinMaxTransform::from_values(dataset.numeric_values(&fit.variable)) {
                Some(transform) => marginal.with_transform(transform),
                None => marginal,
            };
            marginals.push(marginal);
        }

        let categorical = if self.config.include_categorical {
            self.categorical_marginals(dataset)
        } else {
            vec![]
        };
        log::info!(
            "joint model: {} numeric and {} categorical marginal(s)",
            marginals.len(),
            categorical.len()
        );

        JointDistributionModel::new(marginals, correlation, self.config.copula_mixing)
            .and_then(|model| model.with_categorical(categorical))
            .map_err(|source| SurveyError::Model { source })
    }

    fn categorical_marginals(&self, dataset: &SurveyDataset) -> Vec<CategoricalMarginal> {
        let schema = dataset.schema();
        schema
            .fields_of(FieldType::Categorical)
            .chain(schema.fields_of(FieldType::Boolean))
            .filter_map(|field| {
                let counts = level_counts(dataset.responses(), field);
                let marginal =
                    CategoricalMarginal::from_counts(field, counts, self.config.min_category_count);
                if marginal.is_none() {
                    log::debug!("{field}: no category is frequent enough, not modelled");
                }
                marginal
            })
            .collect()
    }

    /// Compares generated records with the original dataset.
    pub fn validate_generation<'a, I>(
        &self,
        original: &SurveyDataset,
        generated: I,
    ) -> ValidationResult
    where
        I: IntoIterator<Item = &'a Response>,
    {
        let generated = generated.into_iter().collect::<Vec<_>>();
        let variables = original.schema().numeric_fields();

        let mut original_values = BTreeMap::new();
        let mut generated_values = BTreeMap::new();
        let mut original_rows = BTreeMap::new();
        let mut generated_rows = BTreeMap::new();
        for variable in variables {
            let synthetic = dataset::numeric_values(generated.iter().copied(), &variable);
            if synthetic.is_empty() {
                continue;
            }
            original_rows.insert(variable.clone(), original.numeric_column(&variable));
            generated_rows.insert(
                variable.clone(),
                dataset::numeric_column(generated.iter().copied(), &variable),
            );
            original_values.insert(variable.clone(), original.numeric_values(&variable));
            generated_values.insert(variable, synthetic);
        }

        let result = ValidationResult::compare(
            &original_values,
            &generated_values,
            &original_rows,
            &generated_rows,
        );
        log::info!(
            "validation: {}/{} test(s) passed, score {:.3}",
            result.passed_count(),
            result.tests.len(),
            result.score
        );
        result
    }
}

#[derive(Debug, Default)]
struct FieldFits {
    fits: Vec<DistributionFit>,
    sparse: Vec<String>,
    unfittable: Vec<String>,
}

/// Ordered stand-in for a level while counting.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum LevelKey<'a> {
    Bool(bool),
    Number(u64),
    Text(&'a str),
}

impl LevelKey<'_> {
    fn into_level(self) -> SampledValue {
        match self {
            LevelKey::Bool(b) => SampledValue::Bool(b),
            LevelKey::Number(bits) => SampledValue::Number(f64::from_bits(bits)),
            LevelKey::Text(s) => SampledValue::Text(s.to_owned()),
        }
    }
}

/// Observed levels of `field` with their counts, in order of first appearance.
fn level_counts(responses: &[Response], field: &str) -> Vec<(SampledValue, u64)> {
    // level -> (first position, count)
    let mut counts = BTreeMap::<LevelKey<'_>, (usize, u64)>::new();
    for (position, value) in responses
        .iter()
        .filter_map(|response| response.get(field))
        .enumerate()
    {
        let key = match value {
            Value::Null => continue,
            Value::Bool(b) => LevelKey::Bool(*b),
            // adding zero folds -0.0 into 0.0
            Value::Number(n) => LevelKey::Number((n + 0.0).to_bits()),
            Value::Text(s) => LevelKey::Text(s),
        };
        counts.entry(key).or_insert((position, 0)).1 += 1;
    }
    let mut counts = counts.into_iter().collect::<Vec<_>>();
    counts.sort_unstable_by_key(|(_, (first, _))| *first);
    counts
        .into_iter()
        .map(|(key, (_, count))| (key.into_level(), count))
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_distr::{Distribution as _, Normal};
    use rand_pcg::Pcg32;

    use super::*;
    use crate::dataset::{FieldSpec, Schema};

    /// `b = 2a + noise`, `c` independent, `group` categorical with a singleton.
    fn dataset(n: usize, rng: &mut Pcg32) -> SurveyDataset {
        let a_dist = Normal::new(40.0, 8.0).unwrap();
        let noise = Normal::new(0.0, 3.0).unwrap();
        let c_dist = Normal::new(5.0, 1.0).unwrap();
        let responses = (0..n)
            .map(|i| {
                let a = a_dist.sample(rng);
                let group = if i == 0 {
                    "singleton"
                } else if i % 2 == 0 {
                    "x"
                } else {
                    "y"
                };
                Response::from_iter([
                    ("a".to_owned(), Value::from(a)),
                    ("b".to_owned(), Value::from(2.0 * a + noise.sample(rng))),
                    ("c".to_owned(), Value::from(c_dist.sample(rng))),
                    ("group".to_owned(), Value::from(group)),
                ])
            })
            .collect();
        let schema = Schema::from_iter([
            ("a".to_owned(), FieldSpec::required(FieldType::Numeric)),
            ("b".to_owned(), FieldSpec::required(FieldType::Numeric)),
            ("c".to_owned(), FieldSpec::optional(FieldType::Numeric)),
            ("group".to_owned(), FieldSpec::optional(FieldType::Categorical)),
        ]);
        SurveyDataset::new(responses, schema)
    }

    #[test]
    fn test_linear_relationship_is_detected() {
        let mut rng = Pcg32::seed_from_u64(50);
        let dataset = dataset(50, &mut rng);
        let matrix = SurveyAnalyzer::default()
            .analyze_correlations(&dataset)
            .unwrap();
        assert_eq!(matrix.variables(), ["a", "b", "c"]);
        let r = matrix.get("a", "b").unwrap();
        assert!(r > 0.8, "r = {r}");
        assert_eq!(matrix.get("a", "a"), Some(1.0));
    }

    #[test]
    fn test_single_numeric_field_is_insufficient() {
        let schema = Schema::from_iter([
            ("a".to_owned(), FieldSpec::required(FieldType::Numeric)),
            ("group".to_owned(), FieldSpec::optional(FieldType::Categorical)),
        ]);
        let responses = vec![Response::from_iter([("a".to_owned(), Value::from(1.0))]); 20];
        let dataset = SurveyDataset::new(responses, schema);
        let err = SurveyAnalyzer::default()
            .analyze_correlations(&dataset)
            .unwrap_err();
        assert!(matches!(err, SurveyError::InsufficientData { .. }), "{err}");
    }

    #[test]
    fn test_sparse_fields_are_skipped() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut dataset = dataset(30, &mut rng);
        let responses = dataset
            .responses()
            .iter()
            .enumerate()
            .map(|(i, response)| {
                let mut response = response.clone();
                if i >= 5 {
                    response.insert("c".to_owned(), Value::Null);
                }
                response
            })
            .collect();
        dataset = SurveyDataset::new(responses, dataset.schema().clone());

        let fits = SurveyAnalyzer::default().detect_distributions(&dataset, &mut rng);
        let variables = fits.iter().map(|f| f.variable.as_str()).collect::<Vec<_>>();
        assert_eq!(variables, ["a", "b"]);
        for fit in &fits {
            assert!(
                fit.alternatives
                    .iter()
                    .all(|alt| alt.goodness_of_fit <= fit.best_fit.goodness_of_fit)
            );
        }
    }

    #[test]
    fn test_joint_model_covers_fields() {
        let mut rng = Pcg32::seed_from_u64(8);
        let dataset = dataset(100, &mut rng);
        let model = SurveyAnalyzer::default()
            .build_joint_distribution(&dataset, &mut rng)
            .unwrap();
        assert_eq!(model.variables().collect::<Vec<_>>(), ["a", "b", "c", "group"]);
        assert!(model.marginals().iter().all(|m| m.transform().is_some()));

        let samples = model.sample(300, &mut rng);
        assert!(samples.iter().all(|s| {
            matches!(s.get("group"), Some(SampledValue::Text(t)) if t != "singleton")
        }));
    }

    #[test]
    fn test_categorical_can_be_disabled() {
        let mut rng = Pcg32::seed_from_u64(8);
        let dataset = dataset(40, &mut rng);
        let analyzer = SurveyAnalyzer::new(PipelineConfig {
            include_categorical: false,
            ..PipelineConfig::default()
        });
        let model = analyzer.build_joint_distribution(&dataset, &mut rng).unwrap();
        assert!(model.categorical().is_empty());
    }

    #[test]
    fn test_too_few_rows_for_any_fit() {
        let mut rng = Pcg32::seed_from_u64(2);
        let dataset = dataset(5, &mut rng);
        let err = SurveyAnalyzer::default()
            .build_joint_distribution(&dataset, &mut rng)
            .unwrap_err();
        assert!(matches!(err, SurveyError::InsufficientData { .. }), "{err}");
    }

    #[test]
    fn test_validate_against_itself() {
        let mut rng = Pcg32::seed_from_u64(4);
        let dataset = dataset(60, &mut rng);
        let result = SurveyAnalyzer::default().validate_generation(&dataset, dataset.responses());
        // 3 ks + 3 mean + correlation
        assert_eq!(result.tests.len(), 7);
        assert!((result.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_level_counts_keep_first_appearance() {
        let answers = ["b", "a", "b", "c", "a", "b"];
        let mut responses = answers
            .iter()
            .map(|answer| Response::from_iter([("q".to_owned(), Value::from(*answer))]))
            .collect::<Vec<_>>();
        responses.extend((0..2000).map(|i| {
            Response::from_iter([("q".to_owned(), Value::from(format!("free text {i}")))])
        }));
        responses.push(Response::from_iter([("q".to_owned(), Value::Null)]));
        responses.push(Response::new());

        let counts = level_counts(&responses, "q");
        assert_eq!(counts.len(), 2003);
        assert_eq!(
            counts[..4],
            [
                (SampledValue::Text("b".to_owned()), 3),
                (SampledValue::Text("a".to_owned()), 2),
                (SampledValue::Text("c".to_owned()), 1),
                (SampledValue::Text("free text 0".to_owned()), 1),
            ]
        );
        assert_eq!(counts.last().map(|(_, count)| *count), Some(1));
    }

    #[test]
    fn test_level_counts_mixed_values() {
        let responses = [
            Value::Bool(true),
            Value::Number(-0.0),
            Value::Number(0.0),
            Value::Bool(true),
            Value::Number(2.5),
        ]
        .into_iter()
        .map(|value| Response::from_iter([("q".to_owned(), value)]))
        .collect::<Vec<_>>();

        let counts = level_counts(&responses, "q");
        assert_eq!(
            counts,
            [
                (SampledValue::Bool(true), 2),
                (SampledValue::Number(-0.0), 2),
                (SampledValue::Number(2.5), 1),
            ]
        );
    }
}
