//! Generated individuals and their grouping.

use popsynth_model::copula::JointSample;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dataset::{Response, Value};

/// Attributes every persona carries, with the value used when the model
/// does not produce them.
pub const DEFAULT_ATTRIBUTES: [(&str, DefaultAttribute); 3] = [
    ("age", DefaultAttribute::Number(30.0)),
    ("occupation", DefaultAttribute::Text("unknown")),
    ("sex", DefaultAttribute::Text("unspecified")),
];

#[derive(Debug, Clone, Copy)]
pub enum DefaultAttribute {
    Number(f64),
    Text(&'static str),
}

impl From<DefaultAttribute> for Value {
    fn from(value: DefaultAttribute) -> Self {
        match value {
            DefaultAttribute::Number(n) => Value::Number(n),
            DefaultAttribute::Text(s) => Value::from(s),
        }
    }
}

/// One synthesized individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: Uuid,
    pub name: String,
    pub attributes: Response,
}

impl Persona {
    /// Builds a persona from a joint sample, filling in [`DEFAULT_ATTRIBUTES`].
    ///
    /// The id is drawn from `rng` so seeded runs are reproducible.
    pub fn from_sample<R>(name: impl Into<String>, sample: JointSample, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let mut attributes = sample
            .into_inner()
            .into_iter()
            .map(|(variable, value)| (variable, Value::from(value)))
            .collect::<Response>();
        for (field, default) in DEFAULT_ATTRIBUTES {
            attributes
                .entry(field.to_owned())
                .or_insert_with(|| default.into());
        }
        Self {
            id: uuid::Builder::from_random_bytes(rng.random()).into_uuid(),
            name: name.into(),
            attributes,
        }
    }
}

/// A named collection of personas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaGroup {
    pub name: String,
    pub personas: Vec<Persona>,
}

impl PersonaGroup {
    #[must_use]
    pub fn new(name: impl Into<String>, personas: Vec<Persona>) -> Self {
        Self {
            name: name.into(),
            personas,
        }
    }

    #[must_use]
    pub fn sample_size(&self) -> usize {
        self.personas.len()
    }

    /// The personas' attribute maps, in order.
    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        self.personas.iter().map(|persona| &persona.attributes)
    }
}

#[cfg(test)]
mod tests {
    use popsynth_model::marginal::SampledValue;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    #[test]
    fn test_defaults_fill_missing_attributes_only() {
        let sample = JointSample::from_iter([
            ("age".to_owned(), SampledValue::Number(47.5)),
            ("income".to_owned(), SampledValue::Number(1000.0)),
        ]);
        let persona = Persona::from_sample("p", sample, &mut Pcg32::seed_from_u64(0));
        assert_eq!(persona.attributes["age"], Value::Number(47.5));
        assert_eq!(persona.attributes["occupation"], Value::from("unknown"));
        assert_eq!(persona.attributes["sex"], Value::from("unspecified"));
        assert_eq!(persona.attributes.len(), 4);
    }

    #[test]
    fn test_ids_follow_the_rng() {
        let make = |seed| {
            let mut rng = Pcg32::seed_from_u64(seed);
            Persona::from_sample("p", JointSample::default(), &mut rng).id
        };
        assert_eq!(make(1), make(1));
        assert_ne!(make(1), make(2));
        assert_eq!(make(1).get_version_num(), 4);
    }

    #[test]
    fn test_group_serialization() {
        let persona = Persona::from_sample("p", JointSample::default(), &mut Pcg32::seed_from_u64(3));
        let group = PersonaGroup::new("g", vec![persona]);
        assert_eq!(group.sample_size(), 1);
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["personas"][0]["attributes"]["age"], 30.0);
        let back: PersonaGroup = serde_json::from_value(json).unwrap();
        assert_eq!(back, group);
    }
}
