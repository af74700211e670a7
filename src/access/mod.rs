//! Group-based access control
//!
//! `resolver` answers "may this user view that entity" from the committed
//! group-privilege rows; `service` maintains those rows.

mod resolver;
mod service;

pub use resolver::{has_privilege_of_type, has_view_privilege, ViewedEntity};
pub use service::{list_group_privileges, upsert_group_privilege, GroupPrivilegeRequest};
