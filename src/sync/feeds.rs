//! Change-detection feeds
//!
//! A device polls with its last checkpoint and a domain name; the feed
//! answers whether anything inside the user's universe changed after that
//! instant. A subject is in the universe either through a direct assignment
//! (for directly-assignable subject types) or through catchment membership
//! plus the user's sync-concept values. The assignment domain itself is not
//! scope-aware and reports only voided rows: a withdrawal is the one change
//! no scoped feed can carry to the device.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::domain::{Individual, SubjectType, User};
use crate::store::Tables;
use crate::types::{AvniError, Result};

/// Entity families a device checkpoint can ask about
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncDomain {
    Subject,
    Enrolment,
    Encounter,
    ProgramEncounter,
    Checklist,
    ChecklistItem,
    IndividualRelationship,
    GroupSubject,
    SubjectAssignment,
}

impl FromStr for SyncDomain {
    type Err = AvniError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "subject" => Ok(SyncDomain::Subject),
            "enrolment" => Ok(SyncDomain::Enrolment),
            "encounter" => Ok(SyncDomain::Encounter),
            "programEncounter" => Ok(SyncDomain::ProgramEncounter),
            "checklist" => Ok(SyncDomain::Checklist),
            "checklistItem" => Ok(SyncDomain::ChecklistItem),
            "individualRelationship" => Ok(SyncDomain::IndividualRelationship),
            "groupSubject" => Ok(SyncDomain::GroupSubject),
            "subjectAssignment" => Ok(SyncDomain::SubjectAssignment),
            other => Err(AvniError::NotFound(format!(
                "'{}' is not a sync domain",
                other
            ))),
        }
    }
}

/// Whether `subject` falls inside `user`'s sync universe
fn in_scope(tables: &Tables, user: &User, subject: &Individual, subject_type: &SubjectType) -> bool {
    if subject_type.is_directly_assignable {
        return tables
            .assignment_for(user.id, subject.id)
            .map(|a| !a.voided)
            .unwrap_or(false);
    }

    let Some(catchment_id) = user.catchment_id else {
        return false;
    };
    let in_catchment = subject
        .address_level_id
        .and_then(|al| tables.catchments.get(&catchment_id).map(|c| c.contains(al)))
        .unwrap_or(false);
    if !in_catchment {
        return false;
    }

    sync_concepts_match(user, subject, subject_type)
}

/// A declared sync concept restricts visibility to subjects whose
/// registration value is among the user's configured values; a user with no
/// configured values sees no subjects of that type.
fn sync_concepts_match(user: &User, subject: &Individual, subject_type: &SubjectType) -> bool {
    let settings = user.sync_settings.for_subject_type(subject_type.uuid);
    for concept_uuid in [
        subject_type.sync_registration_concept_1,
        subject_type.sync_registration_concept_2,
    ]
    .into_iter()
    .flatten()
    {
        let values = match settings {
            Some(s) if s.sync_concept_1 == Some(concept_uuid) => &s.sync_concept_1_values,
            Some(s) if s.sync_concept_2 == Some(concept_uuid) => &s.sync_concept_2_values,
            _ => return false,
        };
        if !values
            .iter()
            .any(|v| subject.observations.matches_value(concept_uuid, v))
        {
            return false;
        }
    }
    true
}

/// Ids of non-voided subjects inside the user's universe
pub fn visible_subject_ids(tables: &Tables, user: &User) -> HashSet<i64> {
    tables
        .individuals
        .values()
        .filter(|subject| !subject.voided)
        .filter(|subject| {
            tables
                .subject_types
                .get(&subject.subject_type_id)
                .map(|st| !st.voided && in_scope(tables, user, subject, st))
                .unwrap_or(false)
        })
        .map(|subject| subject.id)
        .collect()
}

/// Whether anything in `domain` changed for the user after `since`
pub fn has_changes_since(
    tables: &Tables,
    user_id: i64,
    domain: SyncDomain,
    since: DateTime<Utc>,
) -> Result<bool> {
    let user = tables
        .users
        .get(&user_id)
        .ok_or_else(|| AvniError::NotFound(format!("User {} not found", user_id)))?;

    // the one non-scoped domain: only withdrawals matter here, new
    // assignments reach the device through the scoped feeds they bump
    if domain == SyncDomain::SubjectAssignment {
        return Ok(tables
            .assignments
            .values()
            .any(|a| a.voided && a.user_id == user_id && a.audit.last_modified_at > since));
    }

    let scope = visible_subject_ids(tables, user);
    let changed = |audit: &crate::domain::Audit| audit.last_modified_at > since;

    let any = match domain {
        SyncDomain::Subject => tables
            .individuals
            .values()
            .any(|s| scope.contains(&s.id) && changed(&s.audit)),
        SyncDomain::Enrolment => tables
            .enrolments
            .values()
            .any(|e| !e.voided && scope.contains(&e.individual_id) && changed(&e.audit)),
        SyncDomain::Encounter => tables
            .encounters
            .values()
            .any(|e| !e.voided && scope.contains(&e.individual_id) && changed(&e.audit)),
        SyncDomain::ProgramEncounter => tables
            .program_encounters
            .values()
            .any(|e| !e.voided && scope.contains(&e.individual_id) && changed(&e.audit)),
        SyncDomain::Checklist => tables
            .checklists
            .values()
            .any(|c| !c.voided && scope.contains(&c.individual_id) && changed(&c.audit)),
        SyncDomain::ChecklistItem => tables.checklist_items.values().any(|item| {
            !item.voided
                && tables
                    .checklists
                    .get(&item.checklist_id)
                    .map(|c| scope.contains(&c.individual_id))
                    .unwrap_or(false)
                && changed(&item.audit)
        }),
        SyncDomain::IndividualRelationship => tables.individual_relationships.values().any(|r| {
            !r.voided
                && (scope.contains(&r.individual_a_id) || scope.contains(&r.individual_b_id))
                && changed(&r.audit)
        }),
        SyncDomain::GroupSubject => tables.group_subjects.values().any(|gs| {
            !gs.voided
                && (scope.contains(&gs.group_subject_id)
                    || scope.contains(&gs.member_subject_id))
                && changed(&gs.audit)
        }),
        SyncDomain::SubjectAssignment => unreachable!("handled above"),
    };
    Ok(any)
}
