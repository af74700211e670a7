//! Implementation export
//!
//! Bundles the organisation's reference data into a zip so an implementation
//! can be inspected or moved between environments. Each entry is a
//! pretty-printed JSON document, sorted by internal id for stable diffs.

use std::io::{Cursor, Write};

use serde_json::{json, Value};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::store::Tables;
use crate::types::{AvniError, Result};

/// File name the download is served under
pub const EXPORT_FILE_NAME: &str = "impl.zip";

/// Build the export bundle for one organisation
pub fn export_implementation(tables: &Tables, organisation_id: i64) -> Result<Vec<u8>> {
    let organisation = tables
        .organisations
        .get(&organisation_id)
        .ok_or_else(|| AvniError::NotFound(format!("Organisation {} not found", organisation_id)))?;

    let entries: [(&str, Value); 4] = [
        ("organisation.json", serde_json::to_value(organisation)?),
        ("concepts.json", concepts_document(tables)?),
        ("subject_types.json", subject_types_document(tables)?),
        ("catchments.json", catchments_document(tables, organisation_id)?),
    ];

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, document) in entries {
        writer
            .start_file(name, options)
            .map_err(AvniError::internal)?;
        writer.write_all(serde_json::to_string_pretty(&document)?.as_bytes())?;
    }
    let cursor = writer.finish().map_err(AvniError::internal)?;
    Ok(cursor.into_inner())
}

fn concepts_document(tables: &Tables) -> Result<Value> {
    let mut concepts: Vec<_> = tables.concepts.values().filter(|c| !c.voided).collect();
    concepts.sort_by_key(|c| c.id);

    let rendered: Vec<Value> = concepts
        .iter()
        .map(|concept| {
            let answers: Vec<Value> = concept
                .answer_concept_ids()
                .iter()
                .filter_map(|id| tables.concepts.get(id))
                .map(|a| json!({"uuid": a.uuid, "name": a.name}))
                .collect();
            Ok(json!({
                "uuid": concept.uuid,
                "name": concept.name,
                "dataType": concept.data_type,
                "answers": answers,
            }))
        })
        .collect::<Result<_>>()?;
    Ok(Value::Array(rendered))
}

fn subject_types_document(tables: &Tables) -> Result<Value> {
    let mut subject_types: Vec<_> =
        tables.subject_types.values().filter(|st| !st.voided).collect();
    subject_types.sort_by_key(|st| st.id);
    Ok(Value::Array(
        subject_types
            .iter()
            .map(|st| {
                json!({
                    "uuid": st.uuid,
                    "name": st.name,
                    "group": st.is_group,
                    "household": st.is_household,
                    "directlyAssignable": st.is_directly_assignable,
                    "syncRegistrationConcept1": st.sync_registration_concept_1,
                    "syncRegistrationConcept2": st.sync_registration_concept_2,
                })
            })
            .collect(),
    ))
}

fn catchments_document(tables: &Tables, organisation_id: i64) -> Result<Value> {
    let mut catchments: Vec<_> = tables
        .catchments
        .values()
        .filter(|c| !c.voided && c.organisation_id == organisation_id)
        .collect();
    catchments.sort_by_key(|c| c.id);
    Ok(Value::Array(
        catchments
            .iter()
            .map(|catchment| {
                let lineages: Vec<&str> = catchment
                    .address_level_ids
                    .iter()
                    .filter_map(|id| tables.address_levels.get(id))
                    .map(|al| al.title_lineage.as_str())
                    .collect();
                json!({
                    "uuid": catchment.uuid,
                    "name": catchment.name,
                    "locations": lineages,
                })
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Audit, Catchment, Concept, ConceptDataType, Organisation, SubjectType};
    use crate::store::Registry;
    use std::io::Read;
    use uuid::Uuid;

    fn seeded() -> (Registry, i64) {
        let registry = Registry::new();
        let org_id = registry
            .transaction(|t| {
                let org_id = t.next_id();
                t.organisations.insert(
                    org_id,
                    Organisation {
                        id: org_id,
                        uuid: Uuid::new_v4(),
                        name: "Demo".into(),
                        username_suffix: "demo".into(),
                        audit: Audit::default(),
                        voided: false,
                    },
                );
                let concept_id = t.next_id();
                t.concepts
                    .insert(concept_id, Concept::new(concept_id, "Height", ConceptDataType::Numeric));
                let st_id = t.next_id();
                t.subject_types.insert(st_id, SubjectType::new(st_id, "Mother"));
                let catchment_id = t.next_id();
                t.catchments
                    .insert(catchment_id, Catchment::new(catchment_id, "Pune", org_id));
                Ok(org_id)
            })
            .unwrap();
        (registry, org_id)
    }

    #[test]
    fn test_bundle_contains_the_reference_documents() {
        let (registry, org_id) = seeded();
        let bytes = registry.read(|t| export_implementation(t, org_id)).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "organisation.json",
                "concepts.json",
                "subject_types.json",
                "catchments.json"
            ]
        );

        let mut concepts = String::new();
        archive
            .by_name("concepts.json")
            .unwrap()
            .read_to_string(&mut concepts)
            .unwrap();
        let concepts: Value = serde_json::from_str(&concepts).unwrap();
        assert_eq!(concepts[0]["name"], "Height");
    }

    #[test]
    fn test_unknown_organisation_is_a_not_found() {
        let (registry, _) = seeded();
        let err = registry.read(|t| export_implementation(t, 999)).unwrap_err();
        assert!(matches!(err, AvniError::NotFound(_)));
    }
}
