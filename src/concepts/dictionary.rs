//! Concept dictionary lookups
//!
//! A thin view over the committed tables. Name lookup is case-sensitive and
//! never creates: a miss on human input surfaces as a validation error naming
//! the offending value.

use uuid::Uuid;

use crate::domain::Concept;
use crate::store::Tables;
use crate::types::{AvniError, Result};

/// Read-only dictionary view over a table snapshot
pub struct ConceptDictionary<'a> {
    tables: &'a Tables,
}

impl<'a> ConceptDictionary<'a> {
    pub fn new(tables: &'a Tables) -> Self {
        Self { tables }
    }

    pub fn find_by_name(&self, name: &str) -> Option<&'a Concept> {
        self.tables.concept_by_name(name)
    }

    pub fn find_by_uuid(&self, uuid: Uuid) -> Option<&'a Concept> {
        self.tables.concept_by_uuid(uuid)
    }

    /// Resolve human input; miss is a bad request, not an internal fault
    pub fn require_by_name(&self, name: &str) -> Result<&'a Concept> {
        self.find_by_name(name).ok_or_else(|| {
            AvniError::Validation(format!("Concept with name '{}' not found", name))
        })
    }

    pub fn is_coded(&self, concept: &Concept) -> bool {
        concept.is_coded()
    }

    /// Non-voided answer concepts of a coded concept, in declared order
    pub fn answers_of(&self, concept: &Concept) -> Vec<&'a Concept> {
        concept
            .answer_concept_ids()
            .iter()
            .filter_map(|id| self.tables.concepts.get(id))
            .collect()
    }

    /// Resolve an answer name within a coded concept's answer set
    pub fn answer_by_name(&self, concept: &Concept, answer_name: &str) -> Result<&'a Concept> {
        self.answers_of(concept)
            .into_iter()
            .find(|a| a.name == answer_name)
            .ok_or_else(|| {
                AvniError::Validation(format!(
                    "'{}' is not a valid answer for the coded concept '{}'",
                    answer_name, concept.name
                ))
            })
    }

    /// Resolve an answer uuid back to its concept name
    pub fn answer_name_by_uuid(&self, concept: &Concept, answer_uuid: Uuid) -> Result<String> {
        self.answers_of(concept)
            .into_iter()
            .find(|a| a.uuid == answer_uuid)
            .map(|a| a.name.clone())
            .ok_or_else(|| {
                AvniError::Validation(format!(
                    "'{}' is not an answer of the coded concept '{}'",
                    answer_uuid, concept.name
                ))
            })
    }
}
