//! Subject types and operational metadata entities

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Audit;

/// Kind of person, group or household that can be registered
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SubjectType {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub is_group: bool,
    pub is_household: bool,

    /// Whether subjects of this type are assigned to users explicitly rather
    /// than flowing through catchment scope
    pub is_directly_assignable: bool,

    /// Concept whose registration value constrains which subjects a mobile
    /// user receives (slot 1)
    pub sync_registration_concept_1: Option<Uuid>,
    /// Slot 2, see above
    pub sync_registration_concept_2: Option<Uuid>,

    pub audit: Audit,
    pub voided: bool,
}

impl SubjectType {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            is_group: false,
            is_household: false,
            is_directly_assignable: false,
            sync_registration_concept_1: None,
            sync_registration_concept_2: None,
            audit: Audit::default(),
            voided: false,
        }
    }

    /// Which sync slot the given concept occupies on this subject type
    pub fn sync_concept_slot(&self, concept_uuid: Uuid) -> Option<SyncConceptSlot> {
        if self.sync_registration_concept_1 == Some(concept_uuid) {
            Some(SyncConceptSlot::One)
        } else if self.sync_registration_concept_2 == Some(concept_uuid) {
            Some(SyncConceptSlot::Two)
        } else {
            None
        }
    }
}

/// Slot a sync concept occupies on a subject type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncConceptSlot {
    One,
    Two,
}

/// A longitudinal program subjects enrol into
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Program {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub audit: Audit,
    pub voided: bool,
}

/// Kind of visit captured against a subject or an enrolment
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EncounterType {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub audit: Audit,
    pub voided: bool,
}

/// Template a checklist is instantiated from
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChecklistDetail {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub audit: Audit,
    pub voided: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_concept_slot_routing() {
        let state = Uuid::new_v4();
        let caste = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut mother = SubjectType::new(1, "Mother");
        mother.sync_registration_concept_1 = Some(state);
        mother.sync_registration_concept_2 = Some(caste);

        assert_eq!(mother.sync_concept_slot(state), Some(SyncConceptSlot::One));
        assert_eq!(mother.sync_concept_slot(caste), Some(SyncConceptSlot::Two));
        assert_eq!(mother.sync_concept_slot(other), None);
    }
}
