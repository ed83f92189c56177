use std::path::PathBuf;

use chrono::{DateTime, Utc};
use popsynth_model::seed::GenerationSeed;
use popsynth_survey::pipeline::{SurveyAnalysis, SurveyToDistributionPipeline};
use serde::Serialize;

use super::SurveyArg;
use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct AnalyzeArg {
    #[clap(flatten)]
    survey: SurveyArg,
    /// Pipeline configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisReport {
    analyzed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    sample_size: usize,
    seed: GenerationSeed,
    #[serde(flatten)]
    analysis: SurveyAnalysis,
}

pub(crate) fn run(arg: &AnalyzeArg) -> anyhow::Result<()> {
    let AnalyzeArg {
        survey,
        config,
        output,
    } = arg;

    let config = util::read_config_file(config.as_deref())?;
    let dataset = survey.load()?;
    let mut pipeline = SurveyToDistributionPipeline::new(config);

    eprintln!("Analyzing survey...");
    let analysis = pipeline.analyze_survey(&dataset)?;
    eprintln!(
        "Found {} notable correlations, fitted {} of {} numeric fields",
        analysis.notable_pairs.len(),
        analysis.distributions.len(),
        analysis.correlations.len()
    );
    for fit in &analysis.distributions {
        eprintln!(
            "  {}: {} (goodness of fit {:.3})",
            fit.variable, fit.best_fit.family, fit.best_fit.goodness_of_fit
        );
    }

    let report = AnalysisReport {
        analyzed_at: Utc::now(),
        source: dataset.metadata().source.clone(),
        sample_size: dataset.len(),
        seed: pipeline.seed(),
        analysis,
    };
    Output::save_json(&report, output.clone())
}
