//! Observation storage
//!
//! An `ObservationCollection` is a map from concept UUID to a JSON value.
//! QuestionGroup values nest: a single nested collection, or an ordered list
//! of them for repeated groups. The codec in `concepts::codec` is the only
//! place name-keyed external maps are translated into this shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Map `concept UUID -> value`, stored as a JSON column in the original schema
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct ObservationCollection(pub Map<String, Value>);

impl ObservationCollection {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn put(&mut self, concept_uuid: Uuid, value: Value) {
        self.0.insert(concept_uuid.to_string(), value);
    }

    pub fn get(&self, concept_uuid: Uuid) -> Option<&Value> {
        self.0.get(&concept_uuid.to_string())
    }

    /// Whether the stored value for `concept_uuid` equals or contains
    /// `candidate` (list values match on membership)
    pub fn matches_value(&self, concept_uuid: Uuid, candidate: &str) -> bool {
        match self.get(concept_uuid) {
            Some(Value::String(s)) => s == candidate,
            Some(Value::Array(items)) => items
                .iter()
                .any(|v| v.as_str().map(|s| s == candidate).unwrap_or(false)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matches_value_on_scalar_and_list() {
        let concept = Uuid::new_v4();
        let answer = Uuid::new_v4();

        let mut single = ObservationCollection::new();
        single.put(concept, json!(answer.to_string()));
        assert!(single.matches_value(concept, &answer.to_string()));
        assert!(!single.matches_value(concept, "other"));

        let mut multi = ObservationCollection::new();
        multi.put(concept, json!(["x", answer.to_string()]));
        assert!(multi.matches_value(concept, &answer.to_string()));
    }
}
