//! Provider onboarding
//!
//! A provisioned user gets a receiver row, and when the provider already
//! knows the user's phone number the provider-side contact id is recorded on
//! it. The contact lookup pages through the provider's contact list.

use serde_json::Value;
use tracing::debug;

use crate::domain::{MessageReceiver, ReceiverEntityType, User};
use crate::store::Registry;
use crate::types::{AvniError, Result};

use super::gateway::{MessageGateway, PageRequest};
use super::receiver::save_receiver_if_required;

const CONTACT_PAGE_SIZE: u32 = 100;

/// Register the user as a message receiver and resolve its contact id
pub async fn onboard_user(
    registry: &Registry,
    gateway: &dyn MessageGateway,
    user: &User,
    actor: Option<i64>,
) -> Result<MessageReceiver> {
    let receiver = registry.transaction(|t| {
        save_receiver_if_required(t, ReceiverEntityType::User, user.id, actor)
    })?;
    if receiver.external_id.is_some() || user.phone_number.is_empty() {
        return Ok(receiver);
    }

    let mut offset = 0;
    loop {
        let page = gateway
            .list_contacts(PageRequest { offset, limit: CONTACT_PAGE_SIZE })
            .await?;
        let contacts = match page.as_array() {
            Some(contacts) if !contacts.is_empty() => contacts.clone(),
            _ => {
                debug!(username = %user.username, "provider has no contact for this user yet");
                return Ok(receiver);
            }
        };

        if let Some(contact) = contacts
            .iter()
            .find(|c| c["phone"] == user.phone_number.as_str())
        {
            let external_id = contact_id(contact)?;
            return registry.transaction(|t| {
                let row = t.message_receivers.get_mut(&receiver.id).ok_or_else(|| {
                    AvniError::internal(anyhow::anyhow!("receiver row vanished"))
                })?;
                row.external_id = Some(external_id);
                row.audit.bump(actor);
                Ok(row.clone())
            });
        }
        offset += CONTACT_PAGE_SIZE;
    }
}

fn contact_id(contact: &Value) -> Result<String> {
    match &contact["id"] {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(AvniError::External("gateway contact carries no id".into())),
    }
}
