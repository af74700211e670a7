//! Access-control building blocks
//!
//! A `GroupPrivilege` grants or denies a privilege to a user group at a
//! scope: subject type, optionally narrowed by program, encounter type or
//! checklist detail. Scope fields are monotone: a program implies a subject
//! type, an encounter type implies a program or subject type, a checklist
//! detail implies a subject type.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AvniError, Result};

use super::Audit;

/// A named user group within an organisation
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Group {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub organisation_id: i64,
    pub audit: Audit,
    pub voided: bool,
}

/// Membership of a user in a group
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserGroup {
    pub id: i64,
    pub uuid: Uuid,
    pub user_id: i64,
    pub group_id: i64,
    pub audit: Audit,
    pub voided: bool,
}

/// Closed enumeration of grantable operations
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrivilegeType {
    ViewSubject,
    EditSubject,
    ViewEnrolment,
    EditEnrolment,
    ViewEncounter,
    EditEncounter,
    ViewChecklist,
    EditChecklist,
    EditUserGroup,
}

/// Privilege catalogue entry
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Privilege {
    pub id: i64,
    pub uuid: Uuid,
    pub privilege_type: PrivilegeType,
    pub name: String,
    pub voided: bool,
}

/// Grant/deny of a privilege to a group at a scope
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GroupPrivilege {
    pub id: i64,
    pub uuid: Uuid,
    pub group_id: i64,
    pub privilege_id: i64,
    pub subject_type_id: Option<i64>,
    pub program_id: Option<i64>,
    pub encounter_type_id: Option<i64>,
    pub program_encounter_type_id: Option<i64>,
    pub checklist_detail_id: Option<i64>,
    pub allow: bool,
    pub audit: Audit,
    pub voided: bool,
}

/// The scope portion of a group privilege; two rows with the same key must
/// not coexist for the same group and privilege
pub type ScopeKey = (
    i64,
    i64,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
);

impl GroupPrivilege {
    pub fn scope_key(&self) -> ScopeKey {
        (
            self.group_id,
            self.privilege_id,
            self.subject_type_id,
            self.program_id,
            self.encounter_type_id,
            self.program_encounter_type_id,
            self.checklist_detail_id,
        )
    }

    /// Enforce scope-field monotonicity
    pub fn validate_scope(&self) -> Result<()> {
        if self.program_id.is_some() && self.subject_type_id.is_none() {
            return Err(AvniError::Validation(
                "A program-scoped privilege requires a subject type".into(),
            ));
        }
        if (self.encounter_type_id.is_some() || self.program_encounter_type_id.is_some())
            && self.subject_type_id.is_none()
        {
            return Err(AvniError::Validation(
                "An encounter-type-scoped privilege requires a subject type".into(),
            ));
        }
        if self.program_encounter_type_id.is_some() && self.program_id.is_none() {
            return Err(AvniError::Validation(
                "A program-encounter-type-scoped privilege requires a program".into(),
            ));
        }
        if self.checklist_detail_id.is_some() && self.subject_type_id.is_none() {
            return Err(AvniError::Validation(
                "A checklist-scoped privilege requires a subject type".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn privilege(subject_type: Option<i64>, program: Option<i64>) -> GroupPrivilege {
        GroupPrivilege {
            id: 1,
            uuid: Uuid::new_v4(),
            group_id: 1,
            privilege_id: 1,
            subject_type_id: subject_type,
            program_id: program,
            encounter_type_id: None,
            program_encounter_type_id: None,
            checklist_detail_id: None,
            allow: true,
            audit: Audit::default(),
            voided: false,
        }
    }

    #[test]
    fn test_scope_monotonicity() {
        assert!(privilege(Some(1), Some(2)).validate_scope().is_ok());
        assert!(privilege(None, Some(2)).validate_scope().is_err());
        assert!(privilege(None, None).validate_scope().is_ok());
    }

    #[test]
    fn test_scope_key_ignores_allow() {
        let mut a = privilege(Some(1), None);
        let mut b = privilege(Some(1), None);
        a.allow = true;
        b.allow = false;
        b.uuid = Uuid::new_v4();
        assert_eq!(a.scope_key(), b.scope_key());
    }
}
