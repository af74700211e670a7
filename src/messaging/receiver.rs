//! Message-receiver registry
//!
//! At most one receiver row exists per entity. Saving for an entity that
//! already has one returns the existing row untouched, including its
//! provider-side contact id.

use tracing::debug;

use crate::domain::{Audit, MessageReceiver, ReceiverEntityType};
use crate::store::Tables;
use crate::types::Result;

/// Return the receiver for the entity, creating one only if absent
pub fn save_receiver_if_required(
    tables: &mut Tables,
    entity_type: ReceiverEntityType,
    entity_id: i64,
    actor: Option<i64>,
) -> Result<MessageReceiver> {
    if let Some(existing) = tables.message_receiver_by_entity(entity_id) {
        debug!(entity_id, "message receiver already registered");
        return Ok(existing.clone());
    }

    let id = tables.next_id();
    let mut receiver = MessageReceiver::new(id, entity_type, entity_id);
    receiver.audit = Audit::new(actor);
    tables.message_receivers.insert(id, receiver.clone());
    Ok(receiver)
}
