//! Audit record carried by every entity
//!
//! Mobile clients sync incrementally on `last_modified_at > checkpoint`, so a
//! bump without a business-state change is the mechanism that delivers a
//! newly-visible entity.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Creation and modification trail for an entity
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Audit {
    /// Internal id of the creating user, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<i64>,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<i64>,

    pub last_modified_at: DateTime<Utc>,
}

impl Audit {
    /// Create a fresh audit record attributed to `by`
    pub fn new(by: Option<i64>) -> Self {
        let now = Utc::now();
        Self {
            created_by: by,
            created_at: now,
            last_modified_by: by,
            last_modified_at: now,
        }
    }

    /// Advance the modification timestamp
    ///
    /// Consecutive bumps within one clock tick must still order, so the new
    /// timestamp is never allowed to equal the previous one.
    pub fn bump(&mut self, by: Option<i64>) {
        let now = Utc::now();
        let floor = self.last_modified_at + Duration::microseconds(1);
        self.last_modified_at = if now > floor { now } else { floor };
        self.last_modified_by = by.or(self.last_modified_by);
    }
}

impl Default for Audit {
    fn default() -> Self {
        Audit::new(None)
    }
}
