//! Route handlers
//!
//! One module per API area; `server::http` owns the method/path match and
//! error rendering.

mod assignments;
mod group_privileges;
mod health;
mod implementation;
mod imports;
mod sync;

pub use assignments::{assignment_metadata, save_assignments};
pub use group_privileges::{list_group_privileges, save_group_privilege};
pub use health::{health, version};
pub use implementation::implementation_export;
pub use imports::{import_group_subjects, import_users};
pub use sync::sync_status;
