//! Shape checks run before a dataset is analyzed.

use std::collections::BTreeSet;

use crate::{
    SurveyError,
    dataset::{FieldType, SurveyDataset},
    error::{SchemaWarning, Violation},
};

/// Number of leading responses inspected for numeric coercion problems.
pub const COERCION_SAMPLE: usize = 5;

/// Checks `dataset` against its schema.
///
/// Fails when there are no responses or no schema, or when a required field
/// is missing, null or of the wrong type in any response. Everything else
/// is reported as a [`SchemaWarning`] and also logged.
pub fn check_structure(dataset: &SurveyDataset) -> Result<Vec<SchemaWarning>, SurveyError> {
    if dataset.is_empty() {
        return Err(SurveyError::EmptyDataset);
    }
    let schema = dataset.schema();
    if schema.is_empty() {
        return Err(SurveyError::EmptySchema);
    }

    let mut warnings = vec![];
    let seen = dataset
        .responses()
        .iter()
        .flat_map(|response| response.keys().map(String::as_str))
        .collect::<BTreeSet<_>>();
    for field in seen.iter().filter(|field| !schema.contains(field)) {
        warnings.push(SchemaWarning::UndeclaredField {
            field: (*field).to_owned(),
        });
    }
    for (field, _) in schema.iter().filter(|(field, _)| !seen.contains(field)) {
        warnings.push(SchemaWarning::UnusedSchemaField {
            field: field.to_owned(),
        });
    }

    for (index, response) in dataset.responses().iter().enumerate() {
        for (field, spec) in schema.iter() {
            let value = response.get(field).filter(|value| !value.is_null());
            match value {
                None if spec.required => {
                    return Err(SurveyError::SchemaViolation {
                        index,
                        field: field.to_owned(),
                        problem: Violation::Missing,
                    });
                }
                Some(value) if !value.is_compatible_with(spec.field_type) => {
                    if spec.required {
                        return Err(SurveyError::SchemaViolation {
                            index,
                            field: field.to_owned(),
                            problem: Violation::WrongType {
                                expected: spec.field_type,
                                found: value.kind(),
                            },
                        });
                    }
                    if spec.field_type == FieldType::Numeric {
                        if index < COERCION_SAMPLE {
                            warnings.push(SchemaWarning::NumericCoercion {
                                index,
                                field: field.to_owned(),
                                found: value.kind(),
                            });
                        }
                    } else {
                        warnings.push(SchemaWarning::TypeMismatch {
                            index,
                            field: field.to_owned(),
                            expected: spec.field_type,
                            found: value.kind(),
                        });
                    }
                }
                _ => {}
            }
        }
    }

    for warning in &warnings {
        log::warn!("{warning}");
    }
    Ok(warnings)
}
