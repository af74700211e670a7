//! Privilege resolution
//!
//! A user's effective privileges are the non-voided rows of the non-voided
//! groups they belong to. Each row grants or denies one privilege at a scope;
//! `None` scope fields are wildcards. When several rows match the same check,
//! the most narrowly scoped row wins, and a tie between an allow and a deny
//! resolves to deny. No matching row at all is a deny. Administrators bypass
//! resolution entirely.

use crate::domain::PrivilegeType;
use crate::store::Tables;

/// Entity being viewed, with its resolved scope ids
#[derive(Clone, Copy, Debug)]
pub enum ViewedEntity {
    Subject {
        subject_type_id: i64,
    },
    Enrolment {
        subject_type_id: i64,
        program_id: i64,
    },
    Encounter {
        subject_type_id: i64,
        encounter_type_id: i64,
    },
    ProgramEncounter {
        subject_type_id: i64,
        program_id: i64,
        encounter_type_id: i64,
    },
    Checklist {
        subject_type_id: i64,
        checklist_detail_id: Option<i64>,
    },
    ChecklistItem {
        subject_type_id: i64,
        checklist_detail_id: Option<i64>,
    },
    /// Viewable only when both endpoint subjects are
    Relationship {
        subject_type_id: i64,
        counterpart_subject_type_id: i64,
    },
    /// Viewable only when both the group and the member subject are
    GroupSubject {
        group_subject_type_id: i64,
        member_subject_type_id: i64,
    },
}

impl ViewedEntity {
    fn privilege_type(&self) -> PrivilegeType {
        match self {
            ViewedEntity::Subject { .. } => PrivilegeType::ViewSubject,
            ViewedEntity::Enrolment { .. } => PrivilegeType::ViewEnrolment,
            ViewedEntity::Encounter { .. } | ViewedEntity::ProgramEncounter { .. } => {
                PrivilegeType::ViewEncounter
            }
            ViewedEntity::Checklist { .. } | ViewedEntity::ChecklistItem { .. } => {
                PrivilegeType::ViewChecklist
            }
            ViewedEntity::Relationship { .. } | ViewedEntity::GroupSubject { .. } => {
                PrivilegeType::ViewSubject
            }
        }
    }

    /// Scope tuple in grant-field order: subject type, program, encounter
    /// type, program encounter type, checklist detail
    fn scope(&self) -> [Option<i64>; 5] {
        match *self {
            ViewedEntity::Subject { subject_type_id } => {
                [Some(subject_type_id), None, None, None, None]
            }
            ViewedEntity::Enrolment { subject_type_id, program_id } => {
                [Some(subject_type_id), Some(program_id), None, None, None]
            }
            ViewedEntity::Encounter { subject_type_id, encounter_type_id } => {
                [Some(subject_type_id), None, Some(encounter_type_id), None, None]
            }
            ViewedEntity::ProgramEncounter {
                subject_type_id,
                program_id,
                encounter_type_id,
            } => [
                Some(subject_type_id),
                Some(program_id),
                None,
                Some(encounter_type_id),
                None,
            ],
            ViewedEntity::Checklist { subject_type_id, checklist_detail_id }
            | ViewedEntity::ChecklistItem { subject_type_id, checklist_detail_id } => {
                [Some(subject_type_id), None, None, None, checklist_detail_id]
            }
            // resolved per endpoint in has_view_privilege; the primary
            // endpoint's scope stands in if a caller resolves them directly
            ViewedEntity::Relationship { subject_type_id, .. } => {
                [Some(subject_type_id), None, None, None, None]
            }
            ViewedEntity::GroupSubject { group_subject_type_id, .. } => {
                [Some(group_subject_type_id), None, None, None, None]
            }
        }
    }
}

struct Grant {
    allow: bool,
    scope: [Option<i64>; 5],
}

impl Grant {
    fn matches(&self, entity_scope: &[Option<i64>; 5]) -> bool {
        self.scope
            .iter()
            .zip(entity_scope)
            .all(|(granted, actual)| match granted {
                None => true,
                Some(_) => granted == actual,
            })
    }

    fn specificity(&self) -> usize {
        self.scope.iter().filter(|f| f.is_some()).count()
    }
}

fn grants_of(tables: &Tables, user_id: i64, privilege_type: PrivilegeType) -> Vec<Grant> {
    let group_ids = tables.group_ids_of_user(user_id);
    tables
        .group_privileges
        .values()
        .filter(|gp| !gp.voided && group_ids.contains(&gp.group_id))
        .filter(|gp| {
            tables
                .privileges
                .get(&gp.privilege_id)
                .map(|p| !p.voided && p.privilege_type == privilege_type)
                .unwrap_or(false)
        })
        .map(|gp| Grant {
            allow: gp.allow,
            scope: [
                gp.subject_type_id,
                gp.program_id,
                gp.encounter_type_id,
                gp.program_encounter_type_id,
                gp.checklist_detail_id,
            ],
        })
        .collect()
}

/// Whether `user_id` may view `entity`
///
/// Relationships and group memberships span two subjects; they are visible
/// only when both endpoint subjects are.
pub fn has_view_privilege(tables: &Tables, user_id: i64, entity: ViewedEntity) -> bool {
    match entity {
        ViewedEntity::Relationship { subject_type_id, counterpart_subject_type_id } => {
            return has_view_privilege(tables, user_id, ViewedEntity::Subject { subject_type_id })
                && has_view_privilege(
                    tables,
                    user_id,
                    ViewedEntity::Subject { subject_type_id: counterpart_subject_type_id },
                );
        }
        ViewedEntity::GroupSubject { group_subject_type_id, member_subject_type_id } => {
            return has_view_privilege(
                tables,
                user_id,
                ViewedEntity::Subject { subject_type_id: group_subject_type_id },
            ) && has_view_privilege(
                tables,
                user_id,
                ViewedEntity::Subject { subject_type_id: member_subject_type_id },
            );
        }
        _ => {}
    }

    if tables.users.get(&user_id).map(|u| u.org_admin).unwrap_or(false) {
        return true;
    }

    let entity_scope = entity.scope();
    let matching: Vec<Grant> = grants_of(tables, user_id, entity.privilege_type())
        .into_iter()
        .filter(|g| g.matches(&entity_scope))
        .collect();

    let Some(narrowest) = matching.iter().map(Grant::specificity).max() else {
        return false;
    };
    matching
        .iter()
        .filter(|g| g.specificity() == narrowest)
        .all(|g| g.allow)
}

/// Scope-independent check, used for administrative operations such as
/// editing group privileges themselves
pub fn has_privilege_of_type(tables: &Tables, user_id: i64, privilege_type: PrivilegeType) -> bool {
    if tables.users.get(&user_id).map(|u| u.org_admin).unwrap_or(false) {
        return true;
    }
    grants_of(tables, user_id, privilege_type)
        .iter()
        .any(|g| g.allow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Audit, Group, GroupPrivilege, Privilege, User, UserGroup,
    };
    use crate::store::Registry;
    use uuid::Uuid;

    struct Fixture {
        registry: Registry,
        user_id: i64,
        group_id: i64,
        view_subject_id: i64,
    }

    fn fixture() -> Fixture {
        let registry = Registry::new();
        let mut ids = (0, 0, 0);
        registry
            .transaction(|t| {
                let user_id = t.next_id();
                t.users.insert(user_id, User::new(user_id, "asha@apf", 1));

                let group_id = t.next_id();
                t.groups.insert(
                    group_id,
                    Group {
                        id: group_id,
                        uuid: Uuid::new_v4(),
                        name: "Field Workers".into(),
                        organisation_id: 1,
                        audit: Audit::default(),
                        voided: false,
                    },
                );
                let ug_id = t.next_id();
                t.user_groups.insert(
                    ug_id,
                    UserGroup {
                        id: ug_id,
                        uuid: Uuid::new_v4(),
                        user_id,
                        group_id,
                        audit: Audit::default(),
                        voided: false,
                    },
                );

                let view_subject_id = t.next_id();
                t.privileges.insert(
                    view_subject_id,
                    Privilege {
                        id: view_subject_id,
                        uuid: Uuid::new_v4(),
                        privilege_type: PrivilegeType::ViewSubject,
                        name: "View subject".into(),
                        voided: false,
                    },
                );

                ids = (user_id, group_id, view_subject_id);
                Ok(())
            })
            .unwrap();

        Fixture {
            registry,
            user_id: ids.0,
            group_id: ids.1,
            view_subject_id: ids.2,
        }
    }

    fn grant(
        t: &mut crate::store::Tables,
        group_id: i64,
        privilege_id: i64,
        subject_type_id: Option<i64>,
        allow: bool,
    ) {
        let id = t.next_id();
        t.group_privileges.insert(
            id,
            GroupPrivilege {
                id,
                uuid: Uuid::new_v4(),
                group_id,
                privilege_id,
                subject_type_id,
                program_id: None,
                encounter_type_id: None,
                program_encounter_type_id: None,
                checklist_detail_id: None,
                allow,
                audit: Audit::default(),
                voided: false,
            },
        );
    }

    #[test]
    fn test_no_matching_grant_denies() {
        let f = fixture();
        f.registry.read(|t| {
            assert!(!has_view_privilege(
                t,
                f.user_id,
                ViewedEntity::Subject { subject_type_id: 7 }
            ));
        });
    }

    #[test]
    fn test_narrower_deny_overrides_wildcard_allow() {
        let f = fixture();
        f.registry
            .transaction(|t| {
                grant(t, f.group_id, f.view_subject_id, None, true);
                grant(t, f.group_id, f.view_subject_id, Some(7), false);
                Ok(())
            })
            .unwrap();

        f.registry.read(|t| {
            assert!(!has_view_privilege(
                t,
                f.user_id,
                ViewedEntity::Subject { subject_type_id: 7 }
            ));
            // the wildcard allow still covers other subject types
            assert!(has_view_privilege(
                t,
                f.user_id,
                ViewedEntity::Subject { subject_type_id: 8 }
            ));
        });
    }

    #[test]
    fn test_equal_specificity_tie_resolves_to_deny() {
        let f = fixture();
        f.registry
            .transaction(|t| {
                grant(t, f.group_id, f.view_subject_id, Some(7), true);
                grant(t, f.group_id, f.view_subject_id, Some(7), false);
                Ok(())
            })
            .unwrap();

        f.registry.read(|t| {
            assert!(!has_view_privilege(
                t,
                f.user_id,
                ViewedEntity::Subject { subject_type_id: 7 }
            ));
        });
    }

    #[test]
    fn test_voided_rows_and_groups_are_ignored() {
        let f = fixture();
        f.registry
            .transaction(|t| {
                grant(t, f.group_id, f.view_subject_id, Some(7), true);
                for gp in t.group_privileges.values_mut() {
                    gp.voided = true;
                }
                Ok(())
            })
            .unwrap();

        f.registry.read(|t| {
            assert!(!has_view_privilege(
                t,
                f.user_id,
                ViewedEntity::Subject { subject_type_id: 7 }
            ));
        });
    }

    #[test]
    fn test_relationship_needs_both_endpoint_types() {
        let f = fixture();
        f.registry
            .transaction(|t| {
                grant(t, f.group_id, f.view_subject_id, Some(7), true);
                Ok(())
            })
            .unwrap();

        f.registry.read(|t| {
            assert!(!has_view_privilege(
                t,
                f.user_id,
                ViewedEntity::Relationship { subject_type_id: 7, counterpart_subject_type_id: 8 }
            ));
        });

        f.registry
            .transaction(|t| {
                grant(t, f.group_id, f.view_subject_id, Some(8), true);
                Ok(())
            })
            .unwrap();

        f.registry.read(|t| {
            assert!(has_view_privilege(
                t,
                f.user_id,
                ViewedEntity::Relationship { subject_type_id: 7, counterpart_subject_type_id: 8 }
            ));
            assert!(has_view_privilege(
                t,
                f.user_id,
                ViewedEntity::GroupSubject { group_subject_type_id: 8, member_subject_type_id: 7 }
            ));
        });
    }

    #[test]
    fn test_group_membership_denied_when_member_type_is_not_viewable() {
        let f = fixture();
        f.registry
            .transaction(|t| {
                grant(t, f.group_id, f.view_subject_id, Some(7), true);
                Ok(())
            })
            .unwrap();

        f.registry.read(|t| {
            assert!(!has_view_privilege(
                t,
                f.user_id,
                ViewedEntity::GroupSubject { group_subject_type_id: 7, member_subject_type_id: 9 }
            ));
        });
    }

    #[test]
    fn test_org_admin_bypasses_resolution() {
        let f = fixture();
        f.registry
            .transaction(|t| {
                t.users.get_mut(&f.user_id).unwrap().org_admin = true;
                Ok(())
            })
            .unwrap();

        f.registry.read(|t| {
            assert!(has_view_privilege(
                t,
                f.user_id,
                ViewedEntity::Checklist { subject_type_id: 1, checklist_detail_id: None }
            ));
            assert!(has_privilege_of_type(t, f.user_id, PrivilegeType::EditUserGroup));
        });
    }
}
