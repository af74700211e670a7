//! User provisioning and sync-settings construction

mod provisioning;
mod sync_settings;

pub use provisioning::{upsert_user, UserUpsert};
pub(crate) use provisioning::{build_user, commit_upsert, onboard_for_messaging, validate_upsert};
pub use sync_settings::{build_sync_settings, is_sync_attribute_header, parse_sync_header};
