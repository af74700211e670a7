//! Subjects and their dependent entities
//!
//! Individual owns its dependents; dependents refer back by id only, so
//! privilege resolution never walks a back-reference. The sync fan-out in
//! `sync::assignment` is the only writer of their audit records here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Audit, ObservationCollection};

/// A registered subject (person, group or household)
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Individual {
    pub id: i64,
    pub uuid: Uuid,
    pub subject_type_id: i64,
    pub address_level_id: Option<i64>,

    /// External id carried from bulk imports, used to match group members
    pub legacy_id: Option<String>,

    pub observations: ObservationCollection,
    pub audit: Audit,
    pub voided: bool,
}

impl Individual {
    pub fn new(id: i64, subject_type_id: i64) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            subject_type_id,
            address_level_id: None,
            legacy_id: None,
            observations: ObservationCollection::new(),
            audit: Audit::default(),
            voided: false,
        }
    }
}

/// Enrolment of a subject into a program
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProgramEnrolment {
    pub id: i64,
    pub uuid: Uuid,
    pub individual_id: i64,
    pub program_id: i64,
    pub observations: ObservationCollection,
    pub audit: Audit,
    pub voided: bool,
}

/// General (non-program) visit against a subject
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Encounter {
    pub id: i64,
    pub uuid: Uuid,
    pub individual_id: i64,
    pub encounter_type_id: i64,
    pub observations: ObservationCollection,
    pub audit: Audit,
    pub voided: bool,
}

/// Visit captured within a program enrolment
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProgramEncounter {
    pub id: i64,
    pub uuid: Uuid,
    pub program_enrolment_id: i64,
    pub individual_id: i64,
    pub program_id: i64,
    pub encounter_type_id: i64,
    pub observations: ObservationCollection,
    pub audit: Audit,
    pub voided: bool,
}

/// Checklist instantiated for an enrolment from a checklist detail
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Checklist {
    pub id: i64,
    pub uuid: Uuid,
    pub individual_id: i64,
    pub program_enrolment_id: i64,
    pub checklist_detail_id: i64,
    pub audit: Audit,
    pub voided: bool,
}

/// Single item of a checklist
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChecklistItem {
    pub id: i64,
    pub uuid: Uuid,
    pub checklist_id: i64,
    pub observations: ObservationCollection,
    pub audit: Audit,
    pub voided: bool,
}

/// A named kind of relation between two individuals (e.g. "Mother")
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct IndividualRelation {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub voided: bool,
}

/// A concrete relationship between two subjects
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct IndividualRelationship {
    pub id: i64,
    pub uuid: Uuid,
    pub individual_a_id: i64,
    pub individual_b_id: i64,
    pub relation_id: i64,
    pub audit: Audit,
    pub voided: bool,
}

impl IndividualRelationship {
    pub fn involves(&self, individual_id: i64) -> bool {
        self.individual_a_id == individual_id || self.individual_b_id == individual_id
    }
}

/// Role a member plays in a group subject ("Head of household", "Member", ...)
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GroupRole {
    pub id: i64,
    pub uuid: Uuid,
    pub role: String,
    pub group_subject_type_id: Option<i64>,
    pub voided: bool,
}

/// Membership of a subject in a group subject
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GroupSubject {
    pub id: i64,
    pub uuid: Uuid,
    pub group_subject_id: i64,
    pub member_subject_id: i64,
    pub group_role_id: Option<i64>,
    pub audit: Audit,
    pub voided: bool,
}

impl GroupSubject {
    pub fn involves(&self, individual_id: i64) -> bool {
        self.group_subject_id == individual_id || self.member_subject_id == individual_id
    }
}
