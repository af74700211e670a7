//! Explicit data-access layer
//!
//! All aggregates live fully materialised in [`Tables`]; [`Registry`] guards
//! them behind a single `RwLock` and publishes writes with copy-on-write
//! transactions. A failed transaction closure leaves the published state
//! untouched, which is what gives user upserts and assignment fan-outs their
//! "no partial audit bumps" guarantee.
//!
//! This is the seam where a relational driver would attach; persistence
//! plumbing itself is a collaborator, not part of this slice.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::domain::{
    AddressLevel, Catchment, Checklist, ChecklistDetail, ChecklistItem, Concept, Encounter,
    EncounterType, Group, GroupPrivilege, GroupRole, GroupSubject, Individual,
    IndividualRelation, IndividualRelationship, MessageReceiver, Organisation,
    OrganisationConfig, Privilege, Program, ProgramEncounter, ProgramEnrolment, SubjectType,
    User, UserGroup, UserSubjectAssignment,
};
use crate::types::Result;

/// All tables, keyed by internal id
#[derive(Clone, Default)]
pub struct Tables {
    next_id: i64,

    pub organisations: HashMap<i64, Organisation>,
    pub organisation_configs: HashMap<i64, OrganisationConfig>,
    pub address_levels: HashMap<i64, AddressLevel>,
    pub catchments: HashMap<i64, Catchment>,
    pub concepts: HashMap<i64, Concept>,
    pub subject_types: HashMap<i64, SubjectType>,
    pub programs: HashMap<i64, Program>,
    pub encounter_types: HashMap<i64, EncounterType>,
    pub checklist_details: HashMap<i64, ChecklistDetail>,
    pub individuals: HashMap<i64, Individual>,
    pub enrolments: HashMap<i64, ProgramEnrolment>,
    pub encounters: HashMap<i64, Encounter>,
    pub program_encounters: HashMap<i64, ProgramEncounter>,
    pub checklists: HashMap<i64, Checklist>,
    pub checklist_items: HashMap<i64, ChecklistItem>,
    pub individual_relations: HashMap<i64, IndividualRelation>,
    pub individual_relationships: HashMap<i64, IndividualRelationship>,
    pub group_roles: HashMap<i64, GroupRole>,
    pub group_subjects: HashMap<i64, GroupSubject>,
    pub groups: HashMap<i64, Group>,
    pub user_groups: HashMap<i64, UserGroup>,
    pub privileges: HashMap<i64, Privilege>,
    pub group_privileges: HashMap<i64, GroupPrivilege>,
    pub users: HashMap<i64, User>,
    pub assignments: HashMap<i64, UserSubjectAssignment>,
    pub message_receivers: HashMap<i64, MessageReceiver>,
}

impl Tables {
    /// Allocate the next internal id (shared sequence across tables)
    pub fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    // ------------------------------------------------------------------
    // Dictionary lookups
    // ------------------------------------------------------------------

    /// Case-sensitive concept lookup by name
    pub fn concept_by_name(&self, name: &str) -> Option<&Concept> {
        self.concepts
            .values()
            .find(|c| !c.voided && c.name == name)
    }

    pub fn concept_by_uuid(&self, uuid: Uuid) -> Option<&Concept> {
        self.concepts.values().find(|c| c.uuid == uuid)
    }

    pub fn subject_type_by_name(&self, name: &str) -> Option<&SubjectType> {
        self.subject_types
            .values()
            .find(|st| !st.voided && st.name == name)
    }

    pub fn subject_type_by_uuid(&self, uuid: Uuid) -> Option<&SubjectType> {
        self.subject_types.values().find(|st| st.uuid == uuid)
    }

    // ------------------------------------------------------------------
    // Locations
    // ------------------------------------------------------------------

    /// Case-insensitive full-lineage match
    pub fn address_level_by_lineage(&self, lineage: &str) -> Option<&AddressLevel> {
        let wanted = normalize_lineage(lineage);
        self.address_levels
            .values()
            .find(|al| !al.voided && normalize_lineage(&al.title_lineage) == wanted)
    }

    pub fn catchment_by_name(&self, organisation_id: i64, name: &str) -> Option<&Catchment> {
        self.catchments
            .values()
            .find(|c| !c.voided && c.organisation_id == organisation_id && c.name == name)
    }

    // ------------------------------------------------------------------
    // Users and groups
    // ------------------------------------------------------------------

    pub fn organisation_config_of(&self, organisation_id: i64) -> Option<&OrganisationConfig> {
        self.organisation_configs
            .values()
            .find(|c| !c.voided && c.organisation_id == organisation_id)
    }

    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }

    pub fn group_by_name(&self, organisation_id: i64, name: &str) -> Option<&Group> {
        self.groups
            .values()
            .find(|g| !g.voided && g.organisation_id == organisation_id && g.name == name)
    }

    /// Ids of non-voided groups the user belongs to
    pub fn group_ids_of_user(&self, user_id: i64) -> Vec<i64> {
        self.user_groups
            .values()
            .filter(|ug| !ug.voided && ug.user_id == user_id)
            .map(|ug| ug.group_id)
            .collect()
    }

    pub fn group_privilege_by_uuid(&self, uuid: Uuid) -> Option<&GroupPrivilege> {
        self.group_privileges.values().find(|gp| gp.uuid == uuid)
    }

    // ------------------------------------------------------------------
    // Subjects and dependents
    // ------------------------------------------------------------------

    pub fn individual_by_uuid(&self, uuid: Uuid) -> Option<&Individual> {
        self.individuals.values().find(|i| i.uuid == uuid)
    }

    pub fn individual_by_legacy_id(&self, legacy_id: &str) -> Option<&Individual> {
        self.individuals
            .values()
            .find(|i| i.legacy_id.as_deref() == Some(legacy_id))
    }

    pub fn enrolment_ids_of(&self, individual_id: i64) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .enrolments
            .values()
            .filter(|e| e.individual_id == individual_id)
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn encounter_ids_of(&self, individual_id: i64) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .encounters
            .values()
            .filter(|e| e.individual_id == individual_id)
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn program_encounter_ids_of(&self, individual_id: i64) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .program_encounters
            .values()
            .filter(|e| e.individual_id == individual_id)
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn checklist_ids_of(&self, individual_id: i64) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .checklists
            .values()
            .filter(|c| c.individual_id == individual_id)
            .map(|c| c.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn checklist_item_ids_of(&self, checklist_id: i64) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .checklist_items
            .values()
            .filter(|ci| ci.checklist_id == checklist_id)
            .map(|ci| ci.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn relationship_ids_involving(&self, individual_id: i64) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .individual_relationships
            .values()
            .filter(|r| r.involves(individual_id))
            .map(|r| r.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn group_subject_ids_involving(&self, individual_id: i64) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .group_subjects
            .values()
            .filter(|gs| gs.involves(individual_id))
            .map(|gs| gs.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn group_subject_for(&self, group_id: i64, member_id: i64) -> Option<&GroupSubject> {
        self.group_subjects
            .values()
            .find(|gs| gs.group_subject_id == group_id && gs.member_subject_id == member_id)
    }

    pub fn group_role_by_name(&self, role: &str) -> Option<&GroupRole> {
        self.group_roles
            .values()
            .find(|gr| !gr.voided && gr.role == role)
    }

    pub fn individual_relation_by_name(&self, name: &str) -> Option<&IndividualRelation> {
        let wanted = name.to_lowercase();
        self.individual_relations
            .values()
            .find(|r| r.name.to_lowercase() == wanted)
    }

    // ------------------------------------------------------------------
    // Assignments and receivers
    // ------------------------------------------------------------------

    pub fn assignment_for(&self, user_id: i64, subject_id: i64) -> Option<&UserSubjectAssignment> {
        self.assignments
            .values()
            .find(|a| a.user_id == user_id && a.subject_id == subject_id)
    }

    pub fn message_receiver_by_entity(&self, entity_id: i64) -> Option<&MessageReceiver> {
        self.message_receivers
            .values()
            .find(|mr| mr.entity_id == entity_id)
    }
}

fn normalize_lineage(lineage: &str) -> String {
    lineage
        .split(',')
        .map(|part| part.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Copy-on-write registry over [`Tables`]
///
/// Reads see the last committed state; a transaction clones the tables,
/// applies the closure and swaps the clone in only on `Ok`.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Tables>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared read access to the committed state
    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let tables = self.inner.read().expect("registry lock poisoned");
        f(&tables)
    }

    /// Run `f` against a private copy of the tables; commit on `Ok`
    pub fn transaction<R>(&self, f: impl FnOnce(&mut Tables) -> Result<R>) -> Result<R> {
        let mut guard = self.inner.write().expect("registry lock poisoned");
        let mut staged = guard.clone();
        let result = f(&mut staged)?;
        *guard = staged;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Concept, ConceptDataType};
    use crate::types::AvniError;

    #[test]
    fn test_transaction_commits_on_ok() {
        let registry = Registry::new();
        registry
            .transaction(|t| {
                let id = t.next_id();
                t.concepts.insert(id, Concept::new(id, "Height", ConceptDataType::Numeric));
                Ok(())
            })
            .unwrap();

        assert!(registry.read(|t| t.concept_by_name("Height").is_some()));
    }

    #[test]
    fn test_transaction_rolls_back_on_err() {
        let registry = Registry::new();
        let result: crate::types::Result<()> = registry.transaction(|t| {
            let id = t.next_id();
            t.concepts.insert(id, Concept::new(id, "Height", ConceptDataType::Numeric));
            Err(AvniError::Validation("boom".into()))
        });

        assert!(result.is_err());
        assert!(registry.read(|t| t.concepts.is_empty()));
        // the id sequence also rolls back
        registry
            .transaction(|t| {
                assert_eq!(t.next_id(), 1);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_lineage_lookup_is_case_insensitive() {
        let registry = Registry::new();
        registry
            .transaction(|t| {
                let id = t.next_id();
                t.address_levels.insert(
                    id,
                    crate::domain::AddressLevel {
                        id,
                        uuid: uuid::Uuid::new_v4(),
                        title: "Pune".into(),
                        level_type: "District".into(),
                        parent_id: None,
                        title_lineage: "India, Maharashtra, Pune".into(),
                        audit: crate::domain::Audit::default(),
                        voided: false,
                    },
                );
                Ok(())
            })
            .unwrap();

        assert!(registry.read(|t| t
            .address_level_by_lineage("india, maharashtra,  PUNE")
            .is_some()));
    }
}
