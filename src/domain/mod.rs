//! Domain entities
//!
//! Semantic attributes only: identity is a stable UUID plus an internal
//! numeric id, every entity carries an [`Audit`] record and a `voided`
//! soft-deletion marker. Aggregates own their children; back-references are
//! stored as ids.

mod access;
mod address;
mod assignment;
mod audit;
mod concept;
mod message;
mod observation;
mod organisation;
mod subject;
mod subject_type;
mod user;

pub use access::{Group, GroupPrivilege, Privilege, PrivilegeType, ScopeKey, UserGroup};
pub use address::{AddressLevel, Catchment};
pub use assignment::UserSubjectAssignment;
pub use audit::Audit;
pub use concept::{Concept, ConceptAnswer, ConceptDataType};
pub use message::{MessageReceiver, ReceiverEntityType};
pub use observation::ObservationCollection;
pub use organisation::{Organisation, OrganisationConfig, SettingKey};
pub use subject::{
    Checklist, ChecklistItem, Encounter, GroupRole, GroupSubject, Individual,
    IndividualRelation, IndividualRelationship, ProgramEncounter, ProgramEnrolment,
};
pub use subject_type::{ChecklistDetail, EncounterType, Program, SubjectType, SyncConceptSlot};
pub use user::{
    build_settings, Locale, OperatingIndividualScope, SyncSettings, User, UserSyncSettings,
};
