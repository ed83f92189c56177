use std::path::PathBuf;

use clap::{Parser, Subcommand};
use popsynth_survey::dataset::{Schema, SurveyDataset};

use self::{analyze::AnalyzeArg, generate::GenerateArg, validate::ValidateArg};
use crate::util;

mod analyze;
mod generate;
mod validate;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Report correlations and fitted distributions of a survey
    Analyze(#[clap(flatten)] AnalyzeArg),
    /// Generate synthetic personas from a survey
    Generate(#[clap(flatten)] GenerateArg),
    /// Compare previously generated personas with a survey
    Validate(#[clap(flatten)] ValidateArg),
}

/// Survey responses and the schema describing them.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct SurveyArg {
    /// Survey responses (.csv or .json)
    #[arg(long)]
    data: PathBuf,
    /// Schema JSON file
    #[arg(long)]
    schema: PathBuf,
}

impl SurveyArg {
    fn load(&self) -> anyhow::Result<SurveyDataset> {
        let schema: Schema = util::read_json_file("schema", &self.schema)?;
        eprintln!("Loading survey data from {}...", self.data.display());
        let dataset = util::read_dataset_file(&self.data, schema)?;
        eprintln!(
            "Loaded {} responses over {} fields",
            dataset.len(),
            dataset.schema().len()
        );
        Ok(dataset)
    }
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Analyze(arg) => analyze::run(&arg)?,
        Mode::Generate(arg) => generate::run(&arg)?,
        Mode::Validate(arg) => validate::run(&arg)?,
    }
    Ok(())
}
