//! Observation codec
//!
//! Translates name-keyed external observation maps into UUID-keyed
//! [`ObservationCollection`]s and back. Coded answers travel as names on the
//! wire and as answer-concept UUIDs at rest; QuestionGroup values recurse,
//! either a single nested map or an ordered list of them. A `null` value
//! skips the entry on both create and patch, so patching with `null` leaves
//! the stored value untouched.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::{Concept, ObservationCollection};
use crate::store::Tables;
use crate::types::{AvniError, Result};

use super::ConceptDictionary;

/// Build a fresh collection from a name-keyed external map
pub fn encode(tables: &Tables, external: &Map<String, Value>) -> Result<ObservationCollection> {
    let mut observations = ObservationCollection::new();
    patch(tables, external, &mut observations)?;
    Ok(observations)
}

/// Merge a name-keyed external map into an existing collection
///
/// Entries absent from `external` are preserved; `null` entries are skipped.
pub fn patch(
    tables: &Tables,
    external: &Map<String, Value>,
    observations: &mut ObservationCollection,
) -> Result<()> {
    let dict = ConceptDictionary::new(tables);
    for (concept_name, value) in external {
        if value.is_null() {
            continue;
        }
        let concept = dict.require_by_name(concept_name)?;
        let stored = encode_value(tables, &dict, concept, value)?;
        observations.put(concept.uuid, stored);
    }
    Ok(())
}

fn encode_value(
    tables: &Tables,
    dict: &ConceptDictionary<'_>,
    concept: &Concept,
    value: &Value,
) -> Result<Value> {
    match (concept.is_coded(), concept.is_question_group(), value) {
        (true, _, Value::String(answer_name)) => {
            let answer = dict.answer_by_name(concept, answer_name)?;
            Ok(Value::String(answer.uuid.to_string()))
        }
        (true, _, Value::Array(answer_names)) => {
            let mut uuids = Vec::with_capacity(answer_names.len());
            for item in answer_names {
                let answer_name = item.as_str().ok_or_else(|| type_mismatch(concept, item))?;
                let answer = dict.answer_by_name(concept, answer_name)?;
                uuids.push(Value::String(answer.uuid.to_string()));
            }
            Ok(Value::Array(uuids))
        }
        (true, _, other) => Err(type_mismatch(concept, other)),
        (_, true, Value::Object(nested)) => {
            let nested = encode(tables, nested)?;
            Ok(serde_json::to_value(nested)?)
        }
        (_, true, Value::Array(repeats)) => {
            let mut groups = Vec::with_capacity(repeats.len());
            for item in repeats {
                let nested = item.as_object().ok_or_else(|| type_mismatch(concept, item))?;
                groups.push(serde_json::to_value(encode(tables, nested)?)?);
            }
            Ok(Value::Array(groups))
        }
        (_, true, other) => Err(type_mismatch(concept, other)),
        // every other data type stores the wire value as-is
        _ => Ok(value.clone()),
    }
}

/// Render a collection back into a name-keyed external map
pub fn decode(tables: &Tables, observations: &ObservationCollection) -> Result<Map<String, Value>> {
    let dict = ConceptDictionary::new(tables);
    let mut external = Map::new();
    for (concept_uuid, value) in &observations.0 {
        let concept_uuid: Uuid = concept_uuid.parse().map_err(|_| {
            AvniError::internal(anyhow::anyhow!(
                "malformed concept key '{}' in stored observations",
                concept_uuid
            ))
        })?;
        let concept = dict.find_by_uuid(concept_uuid).ok_or_else(|| {
            AvniError::internal(anyhow::anyhow!(
                "stored observation references unknown concept '{}'",
                concept_uuid
            ))
        })?;
        let rendered = decode_value(tables, &dict, concept, value)?;
        external.insert(concept.name.clone(), rendered);
    }
    Ok(external)
}

fn decode_value(
    tables: &Tables,
    dict: &ConceptDictionary<'_>,
    concept: &Concept,
    value: &Value,
) -> Result<Value> {
    match (concept.is_coded(), concept.is_question_group(), value) {
        (true, _, Value::String(answer_uuid)) => {
            let answer_uuid: Uuid = answer_uuid
                .parse()
                .map_err(|_| type_mismatch(concept, value))?;
            Ok(Value::String(dict.answer_name_by_uuid(concept, answer_uuid)?))
        }
        (true, _, Value::Array(answer_uuids)) => {
            let mut names = Vec::with_capacity(answer_uuids.len());
            for item in answer_uuids {
                names.push(decode_value(tables, dict, concept, item)?);
            }
            Ok(Value::Array(names))
        }
        (_, true, Value::Object(_)) => {
            let nested: ObservationCollection = serde_json::from_value(value.clone())?;
            Ok(Value::Object(decode(tables, &nested)?))
        }
        (_, true, Value::Array(repeats)) => {
            let mut groups = Vec::with_capacity(repeats.len());
            for item in repeats {
                groups.push(decode_value(tables, dict, concept, item)?);
            }
            Ok(Value::Array(groups))
        }
        _ => Ok(value.clone()),
    }
}

fn type_mismatch(concept: &Concept, value: &Value) -> AvniError {
    AvniError::Validation(format!(
        "Unexpected value {} for concept '{}' of type {:?}",
        value, concept.name, concept.data_type
    ))
}
