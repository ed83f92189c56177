//! Fidelity checks of generated records against the source survey.
//!
//! For every numeric variable present in both sets:
//!
//! - `ks:<variable>`: two-sample Kolmogorov–Smirnov distance `D`, scored
//!   `1 - D`, passing below the 5 % critical value
//! - `mean:<variable>`: relative mean deviation `|μg - μo| / σo` (with `σo`
//!   floored at the width of a constant column's fitted uniform), scored
//!   `max(0, 1 - deviation)`, passing below [`MEAN_DEVIATION_THRESHOLD`]
//!
//! With at least two shared variables, `correlation_matrix` compares the
//! off-diagonal Pearson coefficients: the mean absolute difference `d` is
//! scored `1 - d / 2` and passes below [`CORRELATION_DIFFERENCE_THRESHOLD`].
//!
//! The aggregate score is the mean of all test scores.

use std::collections::BTreeMap;

use popsynth_model::family::DEGENERATE_WIDTH;
use popsynth_stats::{
    correlation::{CorrelationAnalyzer, CorrelationMatrix},
    descriptive::DescriptiveStats,
    ks,
    summary::SummaryStats,
};
use serde::Serialize;

/// Percentile points reported per variable.
pub const SUMMARY_PERCENTILES: [f64; 3] = [5.0, 50.0, 95.0];

pub const MEAN_DEVIATION_THRESHOLD: f64 = 0.25;

pub const CORRELATION_DIFFERENCE_THRESHOLD: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TestKind {
    KolmogorovSmirnov,
    MeanDeviation,
    CorrelationMatrix,
}

/// Outcome of one comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationTest {
    pub name: String,
    pub kind: TestKind,
    /// Raw test statistic (distance or deviation).
    pub statistic: f64,
    /// The statistic must stay below this value to pass.
    pub threshold: f64,
    /// Normalized score in `[0, 1]`, higher is better.
    pub score: f64,
    pub passed: bool,
}

impl ValidationTest {
    fn new(name: String, kind: TestKind, statistic: f64, threshold: f64, score: f64) -> Self {
        Self {
            name,
            kind,
            statistic,
            threshold,
            score: if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 },
            passed: statistic < threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub original: BTreeMap<String, SummaryStats>,
    pub generated: BTreeMap<String, SummaryStats>,
    pub tests: Vec<ValidationTest>,
    /// Mean test score in `[0, 1]`; `0` without tests.
    pub score: f64,
}

impl ValidationResult {
    /// Compares per-variable columns of the original and generated data.
    ///
    /// `original` and `generated` map each variable to its finite values; the
    /// `*_rows` columns are row-aligned (missing values as `0`) and feed the
    /// correlation comparison. Variables missing from either side are ignored.
    #[must_use]
    pub fn compare(
        original: &BTreeMap<String, Vec<f64>>,
        generated: &BTreeMap<String, Vec<f64>>,
        original_rows: &BTreeMap<String, Vec<f64>>,
        generated_rows: &BTreeMap<String, Vec<f64>>,
    ) -> Self {
        let shared = original
            .iter()
            .filter_map(|(variable, values)| {
                let other = generated.get(variable)?;
                (!values.is_empty() && !other.is_empty()).then_some((variable, values, other))
            })
            .collect::<Vec<_>>();

        let mut result = Self {
            original: BTreeMap::new(),
            generated: BTreeMap::new(),
            tests: vec![],
            score: 0.0,
        };
        for &(variable, observed, synthetic) in &shared {
            if let Some(summary) = SummaryStats::new(observed.iter().copied(), &SUMMARY_PERCENTILES) {
                result.original.insert(variable.clone(), summary);
            }
            if let Some(summary) = SummaryStats::new(synthetic.iter().copied(), &SUMMARY_PERCENTILES) {
                result.generated.insert(variable.clone(), summary);
            }
            result.tests.push(ks_test(variable, observed, synthetic));
            if let Some(test) = mean_test(variable, observed, synthetic) {
                result.tests.push(test);
            }
        }

        let variables = shared
            .iter()
            .map(|(variable, _, _)| (*variable).clone())
            .filter(|v| original_rows.contains_key(v) && generated_rows.contains_key(v))
            .collect::<Vec<_>>();
        if variables.len() >= 2 {
            if let Some(test) = correlation_test(&variables, original_rows, generated_rows) {
                result.tests.push(test);
            }
        }

        result.score = aggregate_score(&result.tests);
        result
    }

    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.tests.iter().filter(|t| t.passed).count()
    }
}

fn ks_test(variable: &str, observed: &[f64], synthetic: &[f64]) -> ValidationTest {
    let d = ks::two_sample_statistic(observed, synthetic);
    let critical = ks::two_sample_critical_value(observed.len(), synthetic.len());
    ValidationTest::new(
        format!("ks:{variable}"),
        TestKind::KolmogorovSmirnov,
        d,
        critical,
        1.0 - d,
    )
}

fn mean_test(variable: &str, observed: &[f64], synthetic: &[f64]) -> Option<ValidationTest> {
    let observed = DescriptiveStats::new(observed.iter().copied())?;
    let synthetic = DescriptiveStats::new(synthetic.iter().copied())?;
    // constant columns are regenerated within the widened uniform's band
    let scale = observed
        .std_dev
        .max(DEGENERATE_WIDTH * observed.mean.abs().max(1.0));
    let deviation = (synthetic.mean - observed.mean).abs() / scale;
    Some(ValidationTest::new(
        format!("mean:{variable}"),
        TestKind::MeanDeviation,
        deviation,
        MEAN_DEVIATION_THRESHOLD,
        1.0 - deviation,
    ))
}

fn correlation_test(
    variables: &[String],
    original_rows: &BTreeMap<String, Vec<f64>>,
    generated_rows: &BTreeMap<String, Vec<f64>>,
) -> Option<ValidationTest> {
    let matrix = |rows: &BTreeMap<String, Vec<f64>>| -> Option<CorrelationMatrix> {
        let columns = variables
            .iter()
            .map(|v| rows.get(v).cloned())
            .collect::<Option<Vec<_>>>()?;
        CorrelationAnalyzer::new()
            .calculate_correlations(variables, &columns, 0.0)
            .ok()
    };
    let original = matrix(original_rows)?;
    let generated = matrix(generated_rows)?;

    let n = variables.len();
    let differences = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .map(|(i, j)| (original.matrix()[i][j] - generated.matrix()[i][j]).abs())
        .collect::<Vec<_>>();
    let mean = DescriptiveStats::new(differences)?.mean;
    Some(ValidationTest::new(
        "correlation_matrix".to_owned(),
        TestKind::CorrelationMatrix,
        mean,
        CORRELATION_DIFFERENCE_THRESHOLD,
        1.0 - mean / 2.0,
    ))
}

#[expect(clippy::cast_precision_loss)]
fn aggregate_score(tests: &[ValidationTest]) -> f64 {
    if tests.is_empty() {
        return 0.0;
    }
    let sum = tests.iter().map(|t| t.score).sum::<f64>();
    (sum / tests.len() as f64).clamp(0.0, 1.0)
}
