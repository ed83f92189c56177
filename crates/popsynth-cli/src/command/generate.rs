use std::path::PathBuf;

use chrono::{DateTime, Utc};
use popsynth_model::seed::GenerationSeed;
use popsynth_survey::{
    persona::PersonaGroup, pipeline::SurveyToDistributionPipeline, validation::ValidationResult,
};
use serde::Serialize;

use super::SurveyArg;
use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct GenerateArg {
    #[clap(flatten)]
    survey: SurveyArg,
    /// Number of personas to generate
    #[arg(long, default_value_t = 100)]
    count: usize,
    /// Also compare the generated personas with the survey
    #[arg(long)]
    validate: bool,
    /// Pipeline configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Written by this command; `validate` reads the `group` back.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationOutput<'a> {
    generated_at: DateTime<Utc>,
    seed: GenerationSeed,
    group: &'a PersonaGroup,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation: Option<&'a ValidationResult>,
}

pub(crate) fn run(arg: &GenerateArg) -> anyhow::Result<()> {
    let GenerateArg {
        survey,
        count,
        validate,
        config,
        output,
    } = arg;

    let config = util::read_config_file(config.as_deref())?;
    let dataset = survey.load()?;
    let mut pipeline = SurveyToDistributionPipeline::new(config);
    eprintln!("Using seed {}", pipeline.seed());

    eprintln!("Generating {count} personas...");
    let (group, validation) = if *validate {
        let (group, validation) = pipeline.generate_and_validate(&dataset, *count)?;
        (group, Some(validation))
    } else {
        (pipeline.generate_personas_from_survey(&dataset, *count)?, None)
    };
    eprintln!("Generated {} personas", group.sample_size());
    if let Some(validation) = &validation {
        eprintln!(
            "Validation: {}/{} tests passed, score {:.3}",
            validation.passed_count(),
            validation.tests.len(),
            validation.score
        );
    }

    let report = GenerationOutput {
        generated_at: Utc::now(),
        seed: pipeline.seed(),
        group: &group,
        validation: validation.as_ref(),
    };
    Output::save_json(&report, output.clone())
}
