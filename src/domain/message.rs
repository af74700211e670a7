//! Outbound-messaging receiver registry

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Audit;

/// Kind of entity a message receiver points at
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiverEntityType {
    Subject,
    User,
    Group,
}

/// Mapping from a platform entity to a gateway contact
///
/// `external_id` is the gateway-side contact id, filled in lazily once the
/// gateway has seen the contact. At most one receiver exists per entity id.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MessageReceiver {
    pub id: i64,
    pub uuid: Uuid,
    pub entity_type: ReceiverEntityType,
    pub entity_id: i64,
    pub external_id: Option<String>,
    pub audit: Audit,
    pub voided: bool,
}

impl MessageReceiver {
    pub fn new(id: i64, entity_type: ReceiverEntityType, entity_id: i64) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            entity_type,
            entity_id,
            external_id: None,
            audit: Audit::default(),
            voided: false,
        }
    }
}
