//! Sync-settings construction from compound import columns
//!
//! Bulk user imports carry sync attribute values in columns whose header is
//! `<subject type name>-><concept name>`. Cell values are comma-separated;
//! for coded concepts each token must name an answer of the concept and is
//! stored as that answer's UUID, for any other concept the raw token is
//! stored. The concept must be declared as one of the subject type's two
//! sync registration concepts, which also decides the slot the values land
//! in.

use std::sync::LazyLock;

use regex::Regex;

use crate::concepts::ConceptDictionary;
use crate::domain::{SyncConceptSlot, SyncSettings, UserSyncSettings};
use crate::store::Tables;
use crate::types::{AvniError, Result};

static SYNC_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<subject>.*?)->(?P<concept>.*)$").expect("header pattern"));

/// Whether a column header is a compound sync-attribute header
pub fn is_sync_attribute_header(header: &str) -> bool {
    SYNC_HEADER_RE.is_match(header)
}

/// Split a compound header into subject type name and concept name
pub fn parse_sync_header(header: &str) -> Option<(&str, &str)> {
    let captures = SYNC_HEADER_RE.captures(header)?;
    Some((
        captures.name("subject")?.as_str().trim(),
        captures.name("concept")?.as_str().trim(),
    ))
}

/// Build a user's sync settings from `(header, cell value)` pairs
///
/// Blank cells are skipped. Headers for the same subject type merge into a
/// single per-subject-type entry.
pub fn build_sync_settings(tables: &Tables, entries: &[(String, String)]) -> Result<SyncSettings> {
    let dict = ConceptDictionary::new(tables);
    let mut settings: Vec<UserSyncSettings> = Vec::new();

    for (header, cell) in entries {
        if cell.trim().is_empty() {
            continue;
        }
        let (subject_type_name, concept_name) = parse_sync_header(header).ok_or_else(|| {
            AvniError::Validation(format!(
                "'{}' is not a valid sync attribute column; expected \
                 '<subject type>-><concept>'",
                header
            ))
        })?;

        let subject_type = tables.subject_type_by_name(subject_type_name).ok_or_else(|| {
            AvniError::Validation(format!(
                "Subject type '{}' not found",
                subject_type_name
            ))
        })?;
        let concept = dict.require_by_name(concept_name)?;
        let slot = subject_type.sync_concept_slot(concept.uuid).ok_or_else(|| {
            AvniError::Validation(format!(
                "Concept '{}' is not a sync attribute of subject type '{}'",
                concept_name, subject_type_name
            ))
        })?;

        // comma is the only separator; values containing commas cannot be
        // expressed in this column format
        let mut values = Vec::new();
        for token in cell.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if concept.is_coded() {
                let answer = dict.answer_by_name(concept, token)?;
                values.push(answer.uuid.to_string());
            } else {
                values.push(token.to_string());
            }
        }

        let index = match settings
            .iter()
            .position(|s| s.subject_type_uuid == subject_type.uuid)
        {
            Some(index) => index,
            None => {
                settings.push(UserSyncSettings::new(subject_type.uuid));
                settings.len() - 1
            }
        };
        let entry = &mut settings[index];
        match slot {
            SyncConceptSlot::One => {
                entry.sync_concept_1 = Some(concept.uuid);
                entry.sync_concept_1_values = values;
            }
            SyncConceptSlot::Two => {
                entry.sync_concept_2 = Some(concept.uuid);
                entry.sync_concept_2_values = values;
            }
        }
    }

    Ok(SyncSettings {
        subject_type_sync_settings: settings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Concept, ConceptAnswer, ConceptDataType, SubjectType};
    use crate::store::Registry;

    fn seed() -> Registry {
        let registry = Registry::new();
        registry
            .transaction(|t| {
                let pune_id = t.next_id();
                let nashik_id = t.next_id();
                t.concepts
                    .insert(pune_id, Concept::new(pune_id, "Pune", ConceptDataType::Na));
                t.concepts
                    .insert(nashik_id, Concept::new(nashik_id, "Nashik", ConceptDataType::Na));

                let district_id = t.next_id();
                let mut district = Concept::new(district_id, "District", ConceptDataType::Coded);
                district.answers = vec![
                    ConceptAnswer { answer_concept_id: pune_id, order: 1, voided: false },
                    ConceptAnswer { answer_concept_id: nashik_id, order: 2, voided: false },
                ];
                t.concepts.insert(district_id, district);

                let ward_id = t.next_id();
                t.concepts
                    .insert(ward_id, Concept::new(ward_id, "Ward", ConceptDataType::Text));

                let st_id = t.next_id();
                let mut mother = SubjectType::new(st_id, "Mother");
                mother.sync_registration_concept_1 =
                    Some(t.concepts.get(&district_id).unwrap().uuid);
                mother.sync_registration_concept_2 = Some(t.concepts.get(&ward_id).unwrap().uuid);
                t.subject_types.insert(st_id, mother);
                Ok(())
            })
            .unwrap();
        registry
    }

    fn entry(header: &str, cell: &str) -> (String, String) {
        (header.to_string(), cell.to_string())
    }

    #[test]
    fn test_header_detection_and_parsing() {
        assert!(is_sync_attribute_header("Mother->District"));
        assert!(!is_sync_attribute_header("Catchment Name"));
        assert_eq!(
            parse_sync_header(" Mother -> District "),
            Some(("Mother", "District"))
        );
    }

    #[test]
    fn test_coded_values_translate_to_answer_uuids() {
        let registry = seed();
        registry.read(|t| {
            let settings = build_sync_settings(
                t,
                &[
                    entry("Mother->District", "Pune, Nashik"),
                    entry("Mother->Ward", "12"),
                ],
            )
            .unwrap();

            assert_eq!(settings.subject_type_sync_settings.len(), 1);
            let mother = &settings.subject_type_sync_settings[0];
            let pune_uuid = t.concept_by_name("Pune").unwrap().uuid.to_string();
            let nashik_uuid = t.concept_by_name("Nashik").unwrap().uuid.to_string();
            assert_eq!(mother.sync_concept_1_values, vec![pune_uuid, nashik_uuid]);
            assert_eq!(mother.sync_concept_2_values, vec!["12".to_string()]);
        });
    }

    #[test]
    fn test_unknown_answer_value_is_rejected() {
        let registry = seed();
        registry.read(|t| {
            let err =
                build_sync_settings(t, &[entry("Mother->District", "Mumbai")]).unwrap_err();
            assert!(err.to_string().contains("Mumbai"));
        });
    }

    #[test]
    fn test_undeclared_sync_concept_is_rejected() {
        let registry = seed();
        registry.read(|t| {
            let err = build_sync_settings(t, &[entry("Mother->Pune", "x")]).unwrap_err();
            assert!(err
                .to_string()
                .contains("is not a sync attribute of subject type"));
        });
    }

    #[test]
    fn test_blank_cells_yield_empty_settings() {
        let registry = seed();
        registry.read(|t| {
            let settings =
                build_sync_settings(t, &[entry("Mother->District", "  ")]).unwrap();
            assert!(settings.is_empty());
            assert_eq!(serde_json::to_value(&settings).unwrap(), serde_json::json!({}));
        });
    }
}
