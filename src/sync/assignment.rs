//! User-to-subject assignment
//!
//! Assigning a subject must make its whole graph reach the user's device on
//! the next incremental sync, so the engine bumps the audit record of the
//! subject and every dependent entity. Dependents the user may not view are
//! left untouched; an audit bump for an invisible entity would leak its
//! existence into the user's sync stream.
//!
//! The caller runs this inside one registry transaction, so a failure on the
//! nth subject of a batch rolls the whole batch back.

use serde::Deserialize;
use tracing::info;

use crate::access::{has_view_privilege, ViewedEntity};
use crate::domain::UserSubjectAssignment;
use crate::store::Tables;
use crate::types::{AvniError, Result};

/// Wire shape of an assignment save
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRequest {
    pub user_id: i64,
    pub subject_ids: Vec<i64>,
    /// `true` withdraws the assignment instead of creating it
    #[serde(default)]
    pub voided: bool,
}

/// Assign (or withdraw) each subject for the user, with audit fan-out
pub fn assign_subjects(
    tables: &mut Tables,
    organisation_id: i64,
    request: &AssignmentRequest,
    actor: Option<i64>,
) -> Result<Vec<UserSubjectAssignment>> {
    if !tables.users.contains_key(&request.user_id) {
        return Err(AvniError::NotFound(format!(
            "User {} not found",
            request.user_id
        )));
    }

    let mut saved = Vec::with_capacity(request.subject_ids.len());
    for &subject_id in &request.subject_ids {
        let subject = tables
            .individuals
            .get(&subject_id)
            .ok_or_else(|| AvniError::NotFound(format!("Subject {} not found", subject_id)))?;
        let subject_type = tables
            .subject_types
            .get(&subject.subject_type_id)
            .ok_or_else(|| {
                AvniError::internal(anyhow::anyhow!(
                    "subject {} references unknown subject type",
                    subject_id
                ))
            })?;
        if !subject_type.is_directly_assignable {
            return Err(AvniError::Validation(format!(
                "Subject type '{}' is not directly assignable",
                subject_type.name
            )));
        }

        let row = upsert_assignment(tables, organisation_id, request, subject_id, actor)?;
        fan_out(tables, request.user_id, subject_id, actor)?;
        saved.push(row);
    }

    info!(
        user_id = request.user_id,
        subjects = request.subject_ids.len(),
        voided = request.voided,
        "subject assignments saved"
    );
    Ok(saved)
}

/// At most one row per (user, subject); a repeat save lands on that row
fn upsert_assignment(
    tables: &mut Tables,
    organisation_id: i64,
    request: &AssignmentRequest,
    subject_id: i64,
    actor: Option<i64>,
) -> Result<UserSubjectAssignment> {
    let existing_id = tables
        .assignment_for(request.user_id, subject_id)
        .map(|a| a.id);
    match existing_id {
        Some(id) => {
            let row = tables
                .assignments
                .get_mut(&id)
                .ok_or_else(|| AvniError::internal(anyhow::anyhow!("assignment row vanished")))?;
            row.voided = request.voided;
            row.audit.bump(actor);
            Ok(row.clone())
        }
        None => {
            let id = tables.next_id();
            let mut row =
                UserSubjectAssignment::new(id, request.user_id, subject_id, organisation_id);
            row.voided = request.voided;
            row.audit = crate::domain::Audit::new(actor);
            tables.assignments.insert(id, row.clone());
            Ok(row)
        }
    }
}

/// Bump the subject graph so the next incremental sync carries it
///
/// Order: the subject itself, then enrolments, program encounters and general
/// encounters, then the privilege-gated dependents.
fn fan_out(tables: &mut Tables, user_id: i64, subject_id: i64, actor: Option<i64>) -> Result<()> {
    bump(&mut tables.individuals, &[subject_id], actor, |i| &mut i.audit);

    let enrolment_ids = tables.enrolment_ids_of(subject_id);
    bump(&mut tables.enrolments, &enrolment_ids, actor, |e| &mut e.audit);
    let program_encounter_ids = tables.program_encounter_ids_of(subject_id);
    bump(&mut tables.program_encounters, &program_encounter_ids, actor, |e| &mut e.audit);
    let encounter_ids = tables.encounter_ids_of(subject_id);
    bump(&mut tables.encounters, &encounter_ids, actor, |e| &mut e.audit);

    fan_out_checklists(tables, user_id, subject_id, actor);
    fan_out_relationships(tables, user_id, subject_id, actor);
    fan_out_group_subjects(tables, user_id, subject_id, actor);
    Ok(())
}

fn fan_out_checklists(tables: &mut Tables, user_id: i64, subject_id: i64, actor: Option<i64>) {
    let subject_type_id = match tables.individuals.get(&subject_id) {
        Some(subject) => subject.subject_type_id,
        None => return,
    };

    let visible: Vec<i64> = tables
        .checklist_ids_of(subject_id)
        .into_iter()
        .filter(|id| {
            let checklist_detail_id = tables
                .checklists
                .get(id)
                .map(|c| c.checklist_detail_id);
            has_view_privilege(
                tables,
                user_id,
                ViewedEntity::Checklist { subject_type_id, checklist_detail_id },
            )
        })
        .collect();

    for checklist_id in visible {
        bump(&mut tables.checklists, &[checklist_id], actor, |c| &mut c.audit);
        let checklist_detail_id = tables
            .checklists
            .get(&checklist_id)
            .map(|c| c.checklist_detail_id);
        let item_ids: Vec<i64> = tables
            .checklist_item_ids_of(checklist_id)
            .into_iter()
            .filter(|_| {
                has_view_privilege(
                    tables,
                    user_id,
                    ViewedEntity::ChecklistItem { subject_type_id, checklist_detail_id },
                )
            })
            .collect();
        bump(&mut tables.checklist_items, &item_ids, actor, |i| &mut i.audit);
    }
}

/// A relationship is carried only when both endpoint subjects are viewable
fn fan_out_relationships(tables: &mut Tables, user_id: i64, subject_id: i64, actor: Option<i64>) {
    let subject_type_id = match tables.individuals.get(&subject_id) {
        Some(subject) => subject.subject_type_id,
        None => return,
    };

    let visible: Vec<i64> = tables
        .relationship_ids_involving(subject_id)
        .into_iter()
        .filter(|id| {
            tables
                .individual_relationships
                .get(id)
                .map(|r| {
                    let other = if r.individual_a_id == subject_id {
                        r.individual_b_id
                    } else {
                        r.individual_a_id
                    };
                    tables
                        .individuals
                        .get(&other)
                        .map(|o| {
                            has_view_privilege(
                                tables,
                                user_id,
                                ViewedEntity::Relationship {
                                    subject_type_id,
                                    counterpart_subject_type_id: o.subject_type_id,
                                },
                            )
                        })
                        .unwrap_or(false)
                })
                .unwrap_or(false)
        })
        .collect();
    bump(&mut tables.individual_relationships, &visible, actor, |r| &mut r.audit);
}

/// A membership is carried only when both the group and the member are viewable
fn fan_out_group_subjects(tables: &mut Tables, user_id: i64, subject_id: i64, actor: Option<i64>) {
    let visible: Vec<i64> = tables
        .group_subject_ids_involving(subject_id)
        .into_iter()
        .filter(|id| {
            tables
                .group_subjects
                .get(id)
                .and_then(|gs| {
                    let group = tables.individuals.get(&gs.group_subject_id)?;
                    let member = tables.individuals.get(&gs.member_subject_id)?;
                    Some(has_view_privilege(
                        tables,
                        user_id,
                        ViewedEntity::GroupSubject {
                            group_subject_type_id: group.subject_type_id,
                            member_subject_type_id: member.subject_type_id,
                        },
                    ))
                })
                .unwrap_or(false)
        })
        .collect();
    bump(&mut tables.group_subjects, &visible, actor, |gs| &mut gs.audit);
}

fn bump<T>(
    table: &mut std::collections::HashMap<i64, T>,
    ids: &[i64],
    actor: Option<i64>,
    audit_of: impl Fn(&mut T) -> &mut crate::domain::Audit,
) {
    for id in ids {
        if let Some(row) = table.get_mut(id) {
            audit_of(row).bump(actor);
        }
    }
}

/// Reference data the assignment screen needs: assignable subject types, the
/// users they can be assigned to, and the groups and programs used to filter
/// them
pub fn assignment_metadata(tables: &Tables) -> serde_json::Value {
    let mut subject_types: Vec<&crate::domain::SubjectType> = tables
        .subject_types
        .values()
        .filter(|st| !st.voided && st.is_directly_assignable)
        .collect();
    subject_types.sort_by_key(|st| st.id);

    let mut users: Vec<&crate::domain::User> =
        tables.users.values().filter(|u| !u.voided).collect();
    users.sort_by_key(|u| u.id);

    let mut groups: Vec<&crate::domain::Group> =
        tables.groups.values().filter(|g| !g.voided).collect();
    groups.sort_by_key(|g| g.id);

    let mut programs: Vec<&crate::domain::Program> =
        tables.programs.values().filter(|p| !p.voided).collect();
    programs.sort_by_key(|p| p.id);

    serde_json::json!({
        "subjectTypes": subject_types
            .iter()
            .map(|st| serde_json::json!({
                "uuid": st.uuid,
                "name": st.name,
                "syncRegistrationConcept1": st.sync_registration_concept_1,
                "syncRegistrationConcept2": st.sync_registration_concept_2,
            }))
            .collect::<Vec<_>>(),
        "users": users
            .iter()
            .map(|u| serde_json::json!({
                "uuid": u.uuid,
                "username": u.username,
                "name": u.name,
            }))
            .collect::<Vec<_>>(),
        "groups": groups
            .iter()
            .map(|g| serde_json::json!({"uuid": g.uuid, "name": g.name}))
            .collect::<Vec<_>>(),
        "programs": programs
            .iter()
            .map(|p| serde_json::json!({"uuid": p.uuid, "name": p.name}))
            .collect::<Vec<_>>(),
    })
}
