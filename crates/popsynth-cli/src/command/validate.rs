use std::path::PathBuf;

use chrono::{DateTime, Utc};
use popsynth_survey::{analyzer::SurveyAnalyzer, persona::PersonaGroup, validation::ValidationResult};
use serde::{Deserialize, Serialize};

use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ValidateArg {
    /// Original survey responses (.csv or .json)
    #[arg(long)]
    original: PathBuf,
    /// Generated personas: the output of `generate` or a bare persona group
    #[arg(long)]
    generated: PathBuf,
    /// Schema JSON file
    #[arg(long)]
    schema: PathBuf,
    /// Pipeline configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeneratedFile {
    Report { group: PersonaGroup },
    Group(PersonaGroup),
}

impl GeneratedFile {
    fn into_group(self) -> PersonaGroup {
        match self {
            GeneratedFile::Report { group } | GeneratedFile::Group(group) => group,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationReport {
    validated_at: DateTime<Utc>,
    group: String,
    sample_size: usize,
    #[serde(flatten)]
    result: ValidationResult,
}

pub(crate) fn run(arg: &ValidateArg) -> anyhow::Result<()> {
    let ValidateArg {
        original,
        generated,
        schema,
        config,
        output,
    } = arg;

    let config = util::read_config_file(config.as_deref())?;
    let schema = util::read_json_file("schema", schema)?;
    let dataset = util::read_dataset_file(original, schema)?;
    let group = util::read_json_file::<GeneratedFile, _>("generated personas", generated)?
        .into_group();
    eprintln!(
        "Comparing {} personas with {} responses...",
        group.sample_size(),
        dataset.len()
    );

    let result = SurveyAnalyzer::new(config).validate_generation(&dataset, group.responses());
    for test in &result.tests {
        eprintln!(
            "  {:<24} {:>8.4} (< {:.4}) {}",
            test.name,
            test.statistic,
            test.threshold,
            if test.passed { "pass" } else { "FAIL" }
        );
    }
    eprintln!("Score: {:.3}", result.score);

    let report = ValidationReport {
        validated_at: Utc::now(),
        group: group.name.clone(),
        sample_size: group.sample_size(),
        result,
    };
    Output::save_json(&report, output.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_generate_output_and_bare_group() {
        let group = r#"{"name": "g", "personas": []}"#;
        let report = format!(r#"{{"generatedAt": "2024-01-01T00:00:00Z", "group": {group}}}"#);
        for json in [group.to_owned(), report] {
            let file: GeneratedFile = serde_json::from_str(&json).unwrap();
            assert_eq!(file.into_group().name, "g");
        }
    }
}
