//! Error types shared across the server
//!
//! Every fallible path funnels into [`AvniError`]; the HTTP layer renders it
//! with [`AvniError::status_code`] so services never reach for status codes
//! themselves.

use thiserror::Error;
use uuid::Uuid;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AvniError>;

/// Server-wide error type
///
/// Variants map 1:1 to the response classes the admin API emits:
/// validation and conflict render as 400, authorization as 403, lookups as
/// 404, external collaborator failures as 502 and everything else as 500.
#[derive(Debug, Error)]
pub enum AvniError {
    /// Malformed or unresolvable user input (unknown concept, bad username, ...)
    #[error("{0}")]
    Validation(String),

    /// Caller lacks the required privilege
    #[error("access denied: {0}")]
    Unauthorized(String),

    /// A referenced entity does not exist (lookup context)
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness rule was violated; the message names the duplicate
    #[error("conflict: {0}")]
    Conflict(String),

    /// IDP or messaging gateway failure, after the adapter-level retry
    #[error("external service failure: {0}")]
    External(String),

    /// Unexpected fault; the correlation id is logged, not the details
    #[error("internal error (correlation id {correlation_id})")]
    Internal {
        correlation_id: Uuid,
        #[source]
        source: anyhow::Error,
    },
}

impl AvniError {
    /// Wrap an unexpected fault with a fresh correlation id
    pub fn internal(source: impl Into<anyhow::Error>) -> Self {
        AvniError::Internal {
            correlation_id: Uuid::new_v4(),
            source: source.into(),
        }
    }

    /// HTTP status code this error renders as
    pub fn status_code(&self) -> u16 {
        match self {
            AvniError::Validation(_) | AvniError::Conflict(_) => 400,
            AvniError::Unauthorized(_) => 403,
            AvniError::NotFound(_) => 404,
            AvniError::External(_) => 502,
            AvniError::Internal { .. } => 500,
        }
    }
}

impl From<serde_json::Error> for AvniError {
    fn from(e: serde_json::Error) -> Self {
        AvniError::internal(e)
    }
}

impl From<std::io::Error> for AvniError {
    fn from(e: std::io::Error) -> Self {
        AvniError::internal(e)
    }
}
