//! Explicit user-to-subject assignment

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Audit;

/// Many-to-many assignment of a subject to a field worker
///
/// At most one non-voided row may exist per (user, subject); re-assignment
/// un-voids and re-bumps the existing row instead of inserting another.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserSubjectAssignment {
    pub id: i64,
    pub uuid: Uuid,
    pub user_id: i64,
    pub subject_id: i64,
    pub organisation_id: i64,
    pub audit: Audit,
    pub voided: bool,
}

impl UserSubjectAssignment {
    pub fn new(id: i64, user_id: i64, subject_id: i64, organisation_id: i64) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            user_id,
            subject_id,
            organisation_id,
            audit: Audit::default(),
            voided: false,
        }
    }
}
