use popsynth_model::copula::CopulaError;
use popsynth_stats::correlation::CorrelationError;
use serde::Serialize;

use crate::dataset::FieldType;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum SurveyError {
    #[display("dataset has no responses")]
    EmptyDataset,
    #[display("dataset has no schema")]
    EmptySchema,
    #[display("insufficient data: {detail}")]
    InsufficientData { detail: String },
    #[display("no distribution could be fitted to any of: {}", fields.join(", "))]
    NoFittableDistribution { fields: Vec<String> },
    #[display("response {index}: required field '{field}' {problem}")]
    SchemaViolation {
        index: usize,
        field: String,
        problem: Violation,
    },
    #[display("failed to read CSV")]
    Csv { source: csv::Error },
    #[display("failed to parse JSON responses")]
    Json { source: serde_json::Error },
    #[display("failed to compute correlations")]
    Correlation { source: CorrelationError },
    #[display("failed to build joint distribution")]
    Model { source: CopulaError },
}

/// How a required field breaks the schema.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum Violation {
    #[display("is missing")]
    Missing,
    #[display("should be {expected} but is {found}")]
    WrongType {
        expected: FieldType,
        found: &'static str,
    },
}

/// A non-fatal schema problem, reported alongside the processed survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, derive_more::Display)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SchemaWarning {
    #[display("field '{field}' appears in responses but not in the schema")]
    UndeclaredField { field: String },
    #[display("schema field '{field}' never appears in responses")]
    UnusedSchemaField { field: String },
    #[display("response {index}: '{field}' is {found}, which cannot be read as a number")]
    NumericCoercion {
        index: usize,
        field: String,
        found: &'static str,
    },
    #[display("response {index}: optional field '{field}' should be {expected} but is {found}")]
    TypeMismatch {
        index: usize,
        field: String,
        expected: FieldType,
        found: &'static str,
    },
}
