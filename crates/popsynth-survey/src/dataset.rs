//! Survey data model and ingestion.
//!
//! A [`SurveyDataset`] is an ordered list of [`Response`] records plus the
//! [`Schema`] describing their fields and free-form [`Metadata`].
//!
//! # Serialization
//!
//! ```json
//! {
//!   "responses": [
//!     { "age": 34, "income": 52000, "region": "north", "smoker": false }
//!   ],
//!   "schema": {
//!     "age": { "type": "numeric", "required": true },
//!     "income": { "type": "numeric" },
//!     "region": { "type": "categorical" },
//!     "smoker": { "type": "boolean" }
//!   },
//!   "metadata": { "sampleSize": 1, "source": "panel-2024.csv" }
//! }
//! ```
//!
//! # Ingestion
//!
//! - [`SurveyDataset::from_csv_reader`] / [`SurveyDataset::from_csv_str`]: the
//!   first line holds the headers, each following line is matched to them by
//!   position and coerced according to the schema
//! - [`SurveyDataset::from_json_reader`]: a JSON array of response objects
//!
//! # Examples
//!
//! ```
//! use popsynth_survey::dataset::{FieldSpec, FieldType, Schema, SurveyDataset, Value};
//!
//! let schema = Schema::from_iter([
//!     ("age".to_owned(), FieldSpec::required(FieldType::Numeric)),
//!     ("smoker".to_owned(), FieldSpec::optional(FieldType::Boolean)),
//! ]);
//! let dataset = SurveyDataset::from_csv_str("age,smoker\n34,TRUE\nabc,no\n", schema).unwrap();
//!
//! assert_eq!(dataset.len(), 2);
//! assert_eq!(dataset.responses()[0]["smoker"], Value::Bool(true));
//! // unparsable numbers become 0
//! assert_eq!(dataset.responses()[1]["age"], Value::Number(0.0));
//! assert_eq!(dataset.metadata().sample_size, 2);
//! ```

use std::{collections::BTreeMap, fmt, io};

use popsynth_model::marginal::SampledValue;
use serde::{Deserialize, Serialize};

use crate::SurveyError;

/// A single answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    /// The numeric value, for [`Value::Number`] only.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Like [`Self::as_f64`], also parsing numeric text.
    #[must_use]
    pub fn coerce_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Null | Self::Bool(_) => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the variant, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
        }
    }

    /// Whether the value can be read as `field_type`. Null is always accepted.
    #[must_use]
    pub fn is_compatible_with(&self, field_type: FieldType) -> bool {
        match (field_type, self) {
            (_, Self::Null) | (FieldType::Categorical, _) => true,
            (FieldType::Numeric, value) => value.coerce_f64().is_some(),
            (FieldType::Boolean, Self::Bool(_)) => true,
            (FieldType::Boolean, Self::Text(s)) => {
                s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false")
            }
            (FieldType::Boolean, Self::Number(_)) => false,
        }
    }

    /// Parses a raw CSV cell as `field_type`.
    ///
    /// Empty cells are null. Unparsable numbers become `0.0`.
    #[must_use]
    pub fn parse_cell(cell: &str, field_type: Option<FieldType>) -> Self {
        let cell = cell.trim();
        if cell.is_empty() {
            return Self::Null;
        }
        match field_type {
            Some(FieldType::Numeric) => Self::Number(cell.parse().unwrap_or(0.0)),
            Some(FieldType::Boolean) => Self::Bool(cell.eq_ignore_ascii_case("true")),
            Some(FieldType::Categorical) | None => Self::Text(cell.to_owned()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<SampledValue> for Value {
    fn from(value: SampledValue) -> Self {
        match value {
            SampledValue::Number(n) => Self::Number(n),
            SampledValue::Bool(b) => Self::Bool(b),
            SampledValue::Text(s) => Self::Text(s),
        }
    }
}

/// One respondent's answers, keyed by field name.
pub type Response = BTreeMap<String, Value>;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::FromStr,
)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[display("numeric")]
    Numeric,
    #[display("categorical")]
    Categorical,
    #[display("boolean")]
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    #[must_use]
    pub fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
        }
    }

    #[must_use]
    pub fn optional(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
        }
    }
}

/// Field name → specification, iterated in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema(BTreeMap<String, FieldSpec>);

impl Schema {
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldSpec> {
        self.0.get(field)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.0.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Names of the fields declared with `field_type`.
    pub fn fields_of(&self, field_type: FieldType) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(move |(_, spec)| spec.field_type == field_type)
            .map(|(name, _)| name)
    }

    #[must_use]
    pub fn numeric_fields(&self) -> Vec<String> {
        self.fields_of(FieldType::Numeric).map(str::to_owned).collect()
    }
}

impl FromIterator<(String, FieldSpec)> for Schema {
    fn from_iter<T: IntoIterator<Item = (String, FieldSpec)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub sample_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyDataset {
    responses: Vec<Response>,
    schema: Schema,
    #[serde(default)]
    metadata: Metadata,
}

impl SurveyDataset {
    /// Builds a dataset, recording the sample size in the metadata.
    #[must_use]
    pub fn new(responses: Vec<Response>, schema: Schema) -> Self {
        let metadata = Metadata {
            sample_size: responses.len(),
            ..Metadata::default()
        };
        Self {
            responses,
            schema,
            metadata,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = Some(source.into());
        self
    }

    /// Reads CSV records, coercing each column by its schema type.
    ///
    /// Columns not declared in the schema are kept as text.
    pub fn from_csv_reader<R>(reader: R, schema: Schema) -> Result<Self, SurveyError>
    where
        R: io::Read,
    {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|source| SurveyError::Csv { source })?
            .iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();
        let field_types = headers
            .iter()
            .map(|header| schema.get(header).map(|spec| spec.field_type))
            .collect::<Vec<_>>();

        let mut responses = vec![];
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|source| SurveyError::Csv { source })?;
            let mut response = Response::new();
            for ((header, field_type), cell) in headers.iter().zip(&field_types).zip(&record) {
                let value = Value::parse_cell(cell, *field_type);
                if *field_type == Some(FieldType::Numeric)
                    && !cell.is_empty()
                    && cell.parse::<f64>().is_err()
                {
                    log::warn!(
                        "row {}: '{header}' value '{cell}' is not a number, using 0",
                        line + 1
                    );
                }
                response.insert(header.clone(), value);
            }
            responses.push(response);
        }
        Ok(Self::new(responses, schema))
    }

    pub fn from_csv_str(input: &str, schema: Schema) -> Result<Self, SurveyError> {
        Self::from_csv_reader(input.as_bytes(), schema)
    }

    /// Reads a JSON array of already structured response objects.
    pub fn from_json_reader<R>(reader: R, schema: Schema) -> Result<Self, SurveyError>
    where
        R: io::Read,
    {
        let responses = serde_json::from_reader(reader).map_err(|source| SurveyError::Json { source })?;
        Ok(Self::new(responses, schema))
    }

    #[must_use]
    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Row-aligned numeric column; missing or non-numeric values read as `0`.
    #[must_use]
    pub fn numeric_column(&self, field: &str) -> Vec<f64> {
        numeric_column(&self.responses, field)
    }

    /// Finite numeric values of `field`, skipping missing and non-numeric ones.
    #[must_use]
    pub fn numeric_values(&self, field: &str) -> Vec<f64> {
        numeric_values(&self.responses, field)
    }
}

pub(crate) fn numeric_column<'a, I>(responses: I, field: &str) -> Vec<f64>
where
    I: IntoIterator<Item = &'a Response>,
{
    responses
        .into_iter()
        .map(|response| {
            response
                .get(field)
                .and_then(Value::coerce_f64)
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
        })
        .collect()
}

pub(crate) fn numeric_values<'a, I>(responses: I, field: &str) -> Vec<f64>
where
    I: IntoIterator<Item = &'a Response>,
{
    responses
        .into_iter()
        .filter_map(|response| response.get(field).and_then(Value::coerce_f64))
        .filter(|v| v.is_finite())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::from_iter([
            ("age".to_owned(), FieldSpec::required(FieldType::Numeric)),
            ("region".to_owned(), FieldSpec::optional(FieldType::Categorical)),
            ("smoker".to_owned(), FieldSpec::optional(FieldType::Boolean)),
        ])
    }

    #[test]
    fn test_csv_coercion() {
        let input = "age,region,smoker,comment\n34, north ,True,hello\n,south,no,\n";
        let dataset = SurveyDataset::from_csv_str(input, schema()).unwrap();
        let rows = dataset.responses();
        assert_eq!(rows[0]["age"], Value::Number(34.0));
        assert_eq!(rows[0]["region"], Value::from("north"));
        assert_eq!(rows[0]["smoker"], Value::Bool(true));
        assert_eq!(rows[0]["comment"], Value::from("hello"));
        assert_eq!(rows[1]["age"], Value::Null);
        assert_eq!(rows[1]["smoker"], Value::Bool(false));
        assert_eq!(rows[1]["comment"], Value::Null);
    }

    #[test]
    fn test_csv_short_rows_leave_fields_absent() {
        let dataset = SurveyDataset::from_csv_str("age,region\n40\n", schema()).unwrap();
        assert!(!dataset.responses()[0].contains_key("region"));
    }

    #[test]
    fn test_json_responses() {
        let input = r#"[{"age": 30, "region": "east", "smoker": null}, {"age": "41"}]"#;
        let dataset = SurveyDataset::from_json_reader(input.as_bytes(), schema()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.responses()[0]["smoker"], Value::Null);
        assert_eq!(dataset.numeric_values("age"), [30.0, 41.0]);
        assert_eq!(dataset.numeric_column("region"), [0.0, 0.0]);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let err = SurveyDataset::from_json_reader(&b"{\"age\": 1}"[..], schema()).unwrap_err();
        assert!(matches!(err, SurveyError::Json { .. }));
    }

    #[test]
    fn test_compatibility() {
        assert!(Value::from("12.5").is_compatible_with(FieldType::Numeric));
        assert!(!Value::from("twelve").is_compatible_with(FieldType::Numeric));
        assert!(Value::from("FALSE").is_compatible_with(FieldType::Boolean));
        assert!(!Value::Number(1.0).is_compatible_with(FieldType::Boolean));
        assert!(Value::Number(1.0).is_compatible_with(FieldType::Categorical));
        assert!(Value::Null.is_compatible_with(FieldType::Numeric));
    }

    #[test]
    fn test_field_type_names() {
        assert_eq!(FieldType::Categorical.to_string(), "categorical");
        assert_eq!("Boolean".parse::<FieldType>().unwrap(), FieldType::Boolean);
        assert!("text".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_dataset_wire_format() {
        let json = serde_json::json!({
            "responses": [{"age": 30, "smoker": true}],
            "schema": {"age": {"type": "numeric", "required": true}, "smoker": {"type": "boolean"}},
            "metadata": {"sampleSize": 1, "wave": 3}
        });
        let dataset: SurveyDataset = serde_json::from_value(json).unwrap();
        assert_eq!(dataset.metadata().sample_size, 1);
        assert_eq!(dataset.metadata().extra["wave"], 3);
        assert_eq!(
            dataset.schema().get("smoker"),
            Some(&FieldSpec::optional(FieldType::Boolean))
        );
        assert_eq!(dataset.schema().numeric_fields(), ["age"]);
    }
}
