//! Assignment engine and change-detection feeds
//!
//! `assignment` moves subjects in and out of a user's universe and bumps the
//! audit trail of everything the user's device must now pull; `feeds` answers
//! the device's "anything new since my checkpoint" poll.

mod assignment;
mod feeds;

pub use assignment::{assign_subjects, assignment_metadata, AssignmentRequest};
pub use feeds::{has_changes_since, visible_subject_ids, SyncDomain};
