//! Group-subject bulk import
//!
//! The first column of the file names the group subject; its header varies by
//! implementation ("Household Id", "SHG Id", ...), so the group reference is
//! always read from the first header. Subjects are referenced by the id
//! carried from the source system (legacy id) or by UUID.
//!
//! Household rows carry an `Is Head of Household` flag instead of a role
//! column; exactly one member may be the head, and every other member must
//! name its relationship with the head, which materialises as an individual
//! relationship. General group rows name their role in a `Role` column.

use tracing::info;
use uuid::Uuid;

use crate::domain::{Audit, GroupSubject, IndividualRelationship};
use crate::store::{Registry, Tables};
use crate::types::{AvniError, Result};

use super::{ImportSummary, Row};

const MEMBER_ID: &str = "Member Id";
const ROLE: &str = "Role";
const IS_HEAD: &str = "Is Head of Household";
const RELATIONSHIP_WITH_HEAD: &str = "Relationship with head of household";

const HEAD_OF_HOUSEHOLD: &str = "Head of household";
const HOUSEHOLD_MEMBER: &str = "Member";

/// Import a batch of group-subject rows in one transaction per row
pub fn import_group_subject_rows(
    registry: &Registry,
    rows: &[Row],
    actor: Option<i64>,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    for (index, row) in rows.iter().enumerate() {
        let result = registry.transaction(|t| import_row(t, row, actor));
        summary.record(index + 1, result)?;
    }
    info!(
        total = summary.total,
        imported = summary.imported,
        failed = summary.errors.len(),
        "group subject import finished"
    );
    Ok(summary)
}

fn find_subject(tables: &Tables, reference: &str, column: &str) -> Result<i64> {
    if reference.is_empty() {
        return Err(AvniError::Validation(format!("'{}' is required", column)));
    }
    if let Some(subject) = tables.individual_by_legacy_id(reference) {
        return Ok(subject.id);
    }
    if let Ok(uuid) = reference.parse::<Uuid>() {
        if let Some(subject) = tables.individual_by_uuid(uuid) {
            return Ok(subject.id);
        }
    }
    Err(AvniError::Validation(format!(
        "'{}' '{}' not found",
        column, reference
    )))
}

fn find_role(
    tables: &Tables,
    role_name: &str,
    group_subject_type_id: i64,
    group_type_name: &str,
) -> Result<i64> {
    let role = tables
        .group_role_by_name(role_name)
        .ok_or_else(|| AvniError::Validation(format!("Group role '{}' not found", role_name)))?;
    if let Some(expected) = role.group_subject_type_id {
        if expected != group_subject_type_id {
            return Err(AvniError::Validation(format!(
                "Role '{}' does not belong to subject type '{}'",
                role_name, group_type_name
            )));
        }
    }
    Ok(role.id)
}

fn import_row(tables: &mut Tables, row: &Row, actor: Option<i64>) -> Result<()> {
    let group_column = row
        .headers()
        .next()
        .ok_or_else(|| AvniError::Validation("The file has no columns".into()))?
        .to_string();
    let group_id = find_subject(tables, row.get(&group_column), &group_column)?;
    let member_id = find_subject(tables, row.get(MEMBER_ID), MEMBER_ID)?;
    if group_id == member_id {
        return Err(AvniError::Validation(
            "A subject cannot be a member of itself".into(),
        ));
    }

    let group = tables
        .individuals
        .get(&group_id)
        .ok_or_else(|| AvniError::internal(anyhow::anyhow!("group row vanished")))?;
    let group_subject_type = tables
        .subject_types
        .get(&group.subject_type_id)
        .ok_or_else(|| AvniError::internal(anyhow::anyhow!("subject type row vanished")))?;
    if !group_subject_type.is_group && !group_subject_type.is_household {
        return Err(AvniError::Validation(format!(
            "Subject type '{}' is not a group",
            group_subject_type.name
        )));
    }
    let is_household = group_subject_type.is_household;
    let group_subject_type_id = group_subject_type.id;
    let group_type_name = group_subject_type.name.clone();

    let relation_name = row.get(RELATIONSHIP_WITH_HEAD).to_string();
    if is_household {
        let is_head = row.get_bool(IS_HEAD)?;
        if is_head {
            if !relation_name.is_empty() {
                return Err(AvniError::Validation(format!(
                    "'{}' does not apply to the head",
                    RELATIONSHIP_WITH_HEAD
                )));
            }
            let role_id =
                find_role(tables, HEAD_OF_HOUSEHOLD, group_subject_type_id, &group_type_name)?;
            // a household has exactly one head
            let head_exists = tables.group_subjects.values().any(|gs| {
                !gs.voided
                    && gs.group_subject_id == group_id
                    && gs.member_subject_id != member_id
                    && gs.group_role_id == Some(role_id)
            });
            if head_exists {
                return Err(AvniError::Validation(
                    "This household already has a head".into(),
                ));
            }
            upsert_membership(tables, group_id, member_id, role_id, actor)?;
        } else {
            if relation_name.is_empty() {
                return Err(AvniError::Validation(format!(
                    "'{}' is required for household members",
                    RELATIONSHIP_WITH_HEAD
                )));
            }
            let role_id =
                find_role(tables, HOUSEHOLD_MEMBER, group_subject_type_id, &group_type_name)?;
            upsert_membership(tables, group_id, member_id, role_id, actor)?;
            link_to_head(tables, group_id, member_id, &relation_name, actor)?;
        }
    } else {
        if !relation_name.is_empty() {
            return Err(AvniError::Validation(format!(
                "'{}' applies only to households",
                RELATIONSHIP_WITH_HEAD
            )));
        }
        let role_name = row.get(ROLE);
        if role_name.is_empty() {
            return Err(AvniError::Validation(format!("'{}' is required", ROLE)));
        }
        let role_id = find_role(tables, role_name, group_subject_type_id, &group_type_name)?;
        upsert_membership(tables, group_id, member_id, role_id, actor)?;
    }
    Ok(())
}

fn upsert_membership(
    tables: &mut Tables,
    group_id: i64,
    member_id: i64,
    role_id: i64,
    actor: Option<i64>,
) -> Result<()> {
    let existing_id = tables.group_subject_for(group_id, member_id).map(|gs| gs.id);
    match existing_id {
        Some(id) => {
            let row = tables
                .group_subjects
                .get_mut(&id)
                .ok_or_else(|| AvniError::internal(anyhow::anyhow!("membership row vanished")))?;
            row.group_role_id = Some(role_id);
            row.voided = false;
            row.audit.bump(actor);
        }
        None => {
            let id = tables.next_id();
            tables.group_subjects.insert(
                id,
                GroupSubject {
                    id,
                    uuid: Uuid::new_v4(),
                    group_subject_id: group_id,
                    member_subject_id: member_id,
                    group_role_id: Some(role_id),
                    audit: Audit::new(actor),
                    voided: false,
                },
            );
        }
    }
    Ok(())
}

/// Create the head-to-member relationship named by the row
fn link_to_head(
    tables: &mut Tables,
    group_id: i64,
    member_id: i64,
    relation_name: &str,
    actor: Option<i64>,
) -> Result<()> {
    let head_role_id = tables
        .group_role_by_name(HEAD_OF_HOUSEHOLD)
        .map(|r| r.id)
        .ok_or_else(|| {
            AvniError::Validation(format!("Group role '{}' not found", HEAD_OF_HOUSEHOLD))
        })?;
    let head_id = tables
        .group_subjects
        .values()
        .find(|gs| {
            !gs.voided
                && gs.group_subject_id == group_id
                && gs.group_role_id == Some(head_role_id)
        })
        .map(|gs| gs.member_subject_id)
        .ok_or_else(|| {
            AvniError::Validation("This household has no head to relate the member to".into())
        })?;
    if head_id == member_id {
        return Ok(());
    }

    let relation = tables.individual_relation_by_name(relation_name).ok_or_else(|| {
        AvniError::Validation(format!("Relation '{}' not found", relation_name))
    })?;
    let relation_id = relation.id;

    let already_linked = tables
        .individual_relationships
        .values()
        .any(|r| !r.voided && r.relation_id == relation_id && r.involves(head_id) && r.involves(member_id));
    if already_linked {
        return Ok(());
    }

    let id = tables.next_id();
    tables.individual_relationships.insert(
        id,
        IndividualRelationship {
            id,
            uuid: Uuid::new_v4(),
            individual_a_id: head_id,
            individual_b_id: member_id,
            relation_id,
            audit: Audit::new(actor),
            voided: false,
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GroupRole, Individual, IndividualRelation, SubjectType};

    struct Fixture {
        registry: Registry,
        household_id: i64,
        head_id: i64,
        member_id: i64,
    }

    fn fixture() -> Fixture {
        let registry = Registry::new();
        let mut ids = (0, 0, 0);
        registry
            .transaction(|t| {
                let household_st = t.next_id();
                let mut st = SubjectType::new(household_st, "Household");
                st.is_household = true;
                t.subject_types.insert(household_st, st);

                let person_st = t.next_id();
                t.subject_types
                    .insert(person_st, SubjectType::new(person_st, "Person"));

                let household_id = t.next_id();
                let mut household = Individual::new(household_id, household_st);
                household.legacy_id = Some("HH-1".into());
                t.individuals.insert(household_id, household);

                let head_id = t.next_id();
                let mut head = Individual::new(head_id, person_st);
                head.legacy_id = Some("P-1".into());
                t.individuals.insert(head_id, head);

                let member_id = t.next_id();
                let mut member = Individual::new(member_id, person_st);
                member.legacy_id = Some("P-2".into());
                t.individuals.insert(member_id, member);

                for role in [HEAD_OF_HOUSEHOLD, HOUSEHOLD_MEMBER] {
                    let id = t.next_id();
                    t.group_roles.insert(
                        id,
                        GroupRole {
                            id,
                            uuid: Uuid::new_v4(),
                            role: role.into(),
                            group_subject_type_id: Some(household_st),
                            voided: false,
                        },
                    );
                }

                let relation_id = t.next_id();
                t.individual_relations.insert(
                    relation_id,
                    IndividualRelation {
                        id: relation_id,
                        uuid: Uuid::new_v4(),
                        name: "Son".into(),
                        voided: false,
                    },
                );

                ids = (household_id, head_id, member_id);
                Ok(())
            })
            .unwrap();
        Fixture { registry, household_id: ids.0, head_id: ids.1, member_id: ids.2 }
    }

    fn household_row(group: &str, member: &str, is_head: &str, relation: &str) -> Row {
        Row::new(
            vec![
                "Household Id".into(),
                MEMBER_ID.into(),
                IS_HEAD.into(),
                RELATIONSHIP_WITH_HEAD.into(),
            ],
            vec![group.into(), member.into(), is_head.into(), relation.into()],
        )
    }

    #[test]
    fn test_head_then_related_member() {
        let f = fixture();
        let summary = import_group_subject_rows(
            &f.registry,
            &[
                household_row("HH-1", "P-1", "yes", ""),
                household_row("HH-1", "P-2", "no", "Son"),
            ],
            None,
        )
        .unwrap();

        assert_eq!(summary.imported, 2);
        f.registry.read(|t| {
            assert!(t.group_subject_for(f.household_id, f.head_id).is_some());
            assert!(t.group_subject_for(f.household_id, f.member_id).is_some());
            let relationship = t
                .individual_relationships
                .values()
                .find(|r| r.involves(f.head_id) && r.involves(f.member_id));
            assert!(relationship.is_some());
        });
    }

    #[test]
    fn test_second_head_is_rejected_but_batch_continues() {
        let f = fixture();
        let summary = import_group_subject_rows(
            &f.registry,
            &[
                household_row("HH-1", "P-1", "yes", ""),
                household_row("HH-1", "P-2", "yes", ""),
                household_row("HH-1", "P-2", "no", "Son"),
            ],
            None,
        )
        .unwrap();

        assert_eq!(summary.imported, 2);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].message.contains("already has a head"));
    }

    #[test]
    fn test_member_without_relationship_is_rejected() {
        let f = fixture();
        let summary = import_group_subject_rows(
            &f.registry,
            &[
                household_row("HH-1", "P-1", "yes", ""),
                household_row("HH-1", "P-2", "no", ""),
            ],
            None,
        )
        .unwrap();

        assert_eq!(summary.imported, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].message.contains("required for household members"));
        // the rejected row's membership rolled back with it
        assert!(f
            .registry
            .read(|t| t.group_subject_for(f.household_id, f.member_id).is_none()));
    }

    #[test]
    fn test_rerun_lands_on_the_same_membership_row() {
        let f = fixture();
        for _ in 0..2 {
            import_group_subject_rows(&f.registry, &[household_row("HH-1", "P-1", "yes", "")], None)
                .unwrap();
        }
        assert_eq!(f.registry.read(|t| t.group_subjects.len()), 1);
    }

    #[test]
    fn test_unknown_subject_reference_fails_the_row() {
        let f = fixture();
        let summary = import_group_subject_rows(
            &f.registry,
            &[household_row("HH-9", "P-1", "yes", "")],
            None,
        )
        .unwrap();
        assert_eq!(summary.imported, 0);
        assert!(summary.errors[0].message.contains("HH-9"));
    }

    #[test]
    fn test_general_group_uses_the_role_column() {
        let f = fixture();
        f.registry
            .transaction(|t| {
                let shg_st = t.next_id();
                let mut st = SubjectType::new(shg_st, "SHG");
                st.is_group = true;
                t.subject_types.insert(shg_st, st);

                let shg_id = t.next_id();
                let mut shg = Individual::new(shg_id, shg_st);
                shg.legacy_id = Some("SHG-1".into());
                t.individuals.insert(shg_id, shg);

                let role_id = t.next_id();
                t.group_roles.insert(
                    role_id,
                    GroupRole {
                        id: role_id,
                        uuid: Uuid::new_v4(),
                        role: "Participant".into(),
                        group_subject_type_id: Some(shg_st),
                        voided: false,
                    },
                );
                Ok(())
            })
            .unwrap();

        let row = Row::new(
            vec!["SHG Id".into(), MEMBER_ID.into(), ROLE.into()],
            vec!["SHG-1".into(), "P-1".into(), "Participant".into()],
        );
        let summary = import_group_subject_rows(&f.registry, &[row], None).unwrap();

        assert_eq!(summary.imported, 1);
        assert!(summary.errors.is_empty());
    }
}
