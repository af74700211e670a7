//! Group-privilege maintenance
//!
//! Rows are upserted by their client-supplied UUID, so a retried save lands
//! on the same row instead of duplicating it. Two live rows may never share a
//! scope tuple for the same group and privilege; a second row for an existing
//! tuple is rejected outright rather than merged.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::domain::{Audit, GroupPrivilege, PrivilegeType};
use crate::store::Tables;
use crate::types::{AvniError, Result};

use super::resolver::has_privilege_of_type;

/// Wire shape of a privilege save
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GroupPrivilegeRequest {
    pub uuid: Uuid,
    pub group_id: i64,
    pub privilege_id: i64,
    #[serde(default)]
    pub subject_type_id: Option<i64>,
    #[serde(default)]
    pub program_id: Option<i64>,
    #[serde(default)]
    pub encounter_type_id: Option<i64>,
    #[serde(default)]
    pub program_encounter_type_id: Option<i64>,
    #[serde(default)]
    pub checklist_detail_id: Option<i64>,
    pub allow: bool,
}

/// Non-voided privilege rows of a group, in stable id order
///
/// Organisation administrators may always read these; other callers need the
/// `EditUserGroup` privilege.
pub fn list_group_privileges(
    tables: &Tables,
    caller_id: i64,
    group_id: i64,
) -> Result<Vec<GroupPrivilege>> {
    let caller_is_admin = tables
        .users
        .get(&caller_id)
        .map(|u| u.org_admin)
        .unwrap_or(false);
    if !caller_is_admin && !has_privilege_of_type(tables, caller_id, PrivilegeType::EditUserGroup) {
        return Err(AvniError::Unauthorized(
            "User is not allowed to view group privileges".into(),
        ));
    }
    if !tables.groups.contains_key(&group_id) {
        return Err(AvniError::NotFound(format!("Group {} not found", group_id)));
    }
    let mut rows: Vec<GroupPrivilege> = tables
        .group_privileges
        .values()
        .filter(|gp| !gp.voided && gp.group_id == group_id)
        .cloned()
        .collect();
    rows.sort_by_key(|gp| gp.id);
    Ok(rows)
}

/// Create or update the row identified by `request.uuid`
pub fn upsert_group_privilege(
    tables: &mut Tables,
    caller_id: i64,
    request: &GroupPrivilegeRequest,
) -> Result<GroupPrivilege> {
    if !has_privilege_of_type(tables, caller_id, PrivilegeType::EditUserGroup) {
        return Err(AvniError::Unauthorized(
            "User is not allowed to edit group privileges".into(),
        ));
    }
    if !tables.users.contains_key(&caller_id) {
        return Err(AvniError::NotFound(format!("User {} not found", caller_id)));
    }

    // unresolved references are client mistakes, reported as 400s
    if !tables.groups.contains_key(&request.group_id) {
        return Err(AvniError::Validation(format!(
            "Group {} not found",
            request.group_id
        )));
    }
    if !tables.privileges.contains_key(&request.privilege_id) {
        return Err(AvniError::Validation(format!(
            "Privilege {} not found",
            request.privilege_id
        )));
    }

    let candidate = GroupPrivilege {
        id: 0,
        uuid: request.uuid,
        group_id: request.group_id,
        privilege_id: request.privilege_id,
        subject_type_id: request.subject_type_id,
        program_id: request.program_id,
        encounter_type_id: request.encounter_type_id,
        program_encounter_type_id: request.program_encounter_type_id,
        checklist_detail_id: request.checklist_detail_id,
        allow: request.allow,
        audit: Audit::default(),
        voided: false,
    };
    candidate.validate_scope()?;

    let scope_key = candidate.scope_key();
    if tables
        .group_privileges
        .values()
        .any(|gp| !gp.voided && gp.uuid != request.uuid && gp.scope_key() == scope_key)
    {
        return Err(AvniError::Conflict(
            "A privilege already exists for this group at the same scope".into(),
        ));
    }

    let existing_id = tables.group_privilege_by_uuid(request.uuid).map(|gp| gp.id);
    let saved = match existing_id {
        Some(id) => {
            let row = tables
                .group_privileges
                .get_mut(&id)
                .ok_or_else(|| AvniError::internal(anyhow::anyhow!("privilege row vanished")))?;
            row.group_id = candidate.group_id;
            row.privilege_id = candidate.privilege_id;
            row.subject_type_id = candidate.subject_type_id;
            row.program_id = candidate.program_id;
            row.encounter_type_id = candidate.encounter_type_id;
            row.program_encounter_type_id = candidate.program_encounter_type_id;
            row.checklist_detail_id = candidate.checklist_detail_id;
            row.allow = candidate.allow;
            row.voided = false;
            row.audit.bump(Some(caller_id));
            row.clone()
        }
        None => {
            let id = tables.next_id();
            let mut row = candidate;
            row.id = id;
            row.audit = Audit::new(Some(caller_id));
            tables.group_privileges.insert(id, row.clone());
            row
        }
    };

    info!(
        uuid = %saved.uuid,
        group_id = saved.group_id,
        allow = saved.allow,
        "group privilege saved"
    );
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Group, Privilege, User};
    use crate::store::Registry;

    struct Fixture {
        registry: Registry,
        admin_id: i64,
        group_id: i64,
        privilege_id: i64,
    }

    fn fixture() -> Fixture {
        let registry = Registry::new();
        let mut ids = (0, 0, 0);
        registry
            .transaction(|t| {
                let admin_id = t.next_id();
                let mut admin = User::new(admin_id, "admin@demo", 1);
                admin.org_admin = true;
                t.users.insert(admin_id, admin);

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

                let privilege_id = t.next_id();
                t.privileges.insert(
                    privilege_id,
                    Privilege {
                        id: privilege_id,
                        uuid: Uuid::new_v4(),
                        privilege_type: PrivilegeType::ViewSubject,
                        name: "View subject".into(),
                        voided: false,
                    },
                );

                ids = (admin_id, group_id, privilege_id);
                Ok(())
            })
            .unwrap();
        Fixture { registry, admin_id: ids.0, group_id: ids.1, privilege_id: ids.2 }
    }

    fn request(f: &Fixture, uuid: Uuid, subject_type_id: Option<i64>) -> GroupPrivilegeRequest {
        GroupPrivilegeRequest {
            uuid,
            group_id: f.group_id,
            privilege_id: f.privilege_id,
            subject_type_id,
            program_id: None,
            encounter_type_id: None,
            program_encounter_type_id: None,
            checklist_detail_id: None,
            allow: true,
        }
    }

    #[test]
    fn test_repeated_save_updates_the_same_row() {
        let f = fixture();
        let uuid = Uuid::new_v4();

        let first = f
            .registry
            .transaction(|t| upsert_group_privilege(t, f.admin_id, &request(&f, uuid, Some(7))))
            .unwrap();

        let mut changed = request(&f, uuid, Some(7));
        changed.allow = false;
        let second = f
            .registry
            .transaction(|t| upsert_group_privilege(t, f.admin_id, &changed))
            .unwrap();

        assert_eq!(first.id, second.id);
        assert!(!second.allow);
        assert!(second.audit.last_modified_at > first.audit.last_modified_at);
        assert_eq!(
            f.registry
                .read(|t| list_group_privileges(t, f.admin_id, f.group_id).unwrap().len()),
            1
        );
    }

    #[test]
    fn test_unresolved_references_are_reported_as_validation() {
        let f = fixture();
        let mut missing_privilege = request(&f, Uuid::new_v4(), None);
        missing_privilege.privilege_id = 999;
        let err = f
            .registry
            .transaction(|t| upsert_group_privilege(t, f.admin_id, &missing_privilege))
            .unwrap_err();
        assert!(matches!(err, AvniError::Validation(_)));
        assert!(err.to_string().contains("999"));

        let mut missing_group = request(&f, Uuid::new_v4(), None);
        missing_group.group_id = 888;
        let err = f
            .registry
            .transaction(|t| upsert_group_privilege(t, f.admin_id, &missing_group))
            .unwrap_err();
        assert!(matches!(err, AvniError::Validation(_)));
    }

    #[test]
    fn test_listing_admits_admins_and_refuses_outsiders() {
        let f = fixture();
        let outsider_id = f
            .registry
            .transaction(|t| {
                let id = t.next_id();
                t.users.insert(id, User::new(id, "asha@demo", 1));
                Ok(id)
            })
            .unwrap();

        f.registry.read(|t| {
            assert!(list_group_privileges(t, f.admin_id, f.group_id).is_ok());
            let err = list_group_privileges(t, outsider_id, f.group_id).unwrap_err();
            assert!(matches!(err, AvniError::Unauthorized(_)));
        });
    }

    #[test]
    fn test_duplicate_scope_under_a_new_uuid_is_rejected() {
        let f = fixture();
        f.registry
            .transaction(|t| {
                upsert_group_privilege(t, f.admin_id, &request(&f, Uuid::new_v4(), Some(7)))
            })
            .unwrap();

        let err = f
            .registry
            .transaction(|t| {
                upsert_group_privilege(t, f.admin_id, &request(&f, Uuid::new_v4(), Some(7)))
            })
            .unwrap_err();
        assert!(matches!(err, AvniError::Conflict(_)));
    }

    #[test]
    fn test_non_admin_without_edit_user_group_is_refused() {
        let f = fixture();
        let outsider_id = f
            .registry
            .transaction(|t| {
                let id = t.next_id();
                t.users.insert(id, User::new(id, "asha@demo", 1));
                Ok(id)
            })
            .unwrap();

        let err = f
            .registry
            .transaction(|t| {
                upsert_group_privilege(t, outsider_id, &request(&f, Uuid::new_v4(), Some(7)))
            })
            .unwrap_err();
        assert!(matches!(err, AvniError::Unauthorized(_)));
    }

    #[test]
    fn test_invalid_scope_is_rejected() {
        let f = fixture();
        let mut bad = request(&f, Uuid::new_v4(), None);
        bad.program_id = Some(3);

        let err = f
            .registry
            .transaction(|t| upsert_group_privilege(t, f.admin_id, &bad))
            .unwrap_err();
        assert!(matches!(err, AvniError::Validation(_)));
    }
}
