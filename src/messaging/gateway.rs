//! Messaging-gateway adapter
//!
//! The provider API takes JSON request bodies kept here as templates with
//! `${...}` placeholders; sending fills the placeholders and posts the
//! result. Every call is retried once before surfacing as an external
//! failure.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::types::{AvniError, Result};

const SEND_MESSAGE_REQUEST: &str = r#"{"templateId": "${templateId}", "receiverId": "${receiverId}", "parameters": ${parameters}}"#;
const LIST_CONTACTS_REQUEST: &str = r#"{"offset": ${offset}, "limit": ${limit}}"#;

/// Page window for contact listing
#[derive(Clone, Copy, Debug)]
pub struct PageRequest {
    pub offset: u32,
    pub limit: u32,
}

/// Outbound operations the server needs from the messaging provider
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Deliver a template message to a provider-side contact
    async fn send_template_message(
        &self,
        receiver_external_id: &str,
        template_id: &str,
        parameters: &[String],
    ) -> Result<()>;

    /// One page of the provider's contact list
    async fn list_contacts(&self, page: PageRequest) -> Result<Value>;
}

/// Gateway used when messaging is not configured
pub struct NoopGateway;

#[async_trait]
impl MessageGateway for NoopGateway {
    async fn send_template_message(
        &self,
        receiver_external_id: &str,
        template_id: &str,
        _parameters: &[String],
    ) -> Result<()> {
        info!(receiver_external_id, template_id, "messaging disabled, dropping message");
        Ok(())
    }

    async fn list_contacts(&self, _page: PageRequest) -> Result<Value> {
        Ok(Value::Array(Vec::new()))
    }
}

fn fill_send_message(template_id: &str, receiver_id: &str, parameters: &[String]) -> Result<String> {
    let parameters = serde_json::to_string(parameters)?;
    Ok(SEND_MESSAGE_REQUEST
        .replace("${templateId}", template_id)
        .replace("${receiverId}", receiver_id)
        .replace("${parameters}", &parameters))
}

fn fill_list_contacts(page: PageRequest) -> String {
    LIST_CONTACTS_REQUEST
        .replace("${offset}", &page.offset.to_string())
        .replace("${limit}", &page.limit.to_string())
}

/// HTTP adapter for the Glific messaging provider
pub struct GlificGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GlificGateway {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Post `body`, retrying once on any failure
    async fn post(&self, path: &str, body: String) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        match self.post_once(&url, body.clone()).await {
            Ok(value) => Ok(value),
            Err(first) => {
                warn!(%url, error = %first, "gateway call failed, retrying once");
                self.post_once(&url, body).await
            }
        }
    }

    async fn post_once(&self, url: &str, body: String) -> Result<Value> {
        let response = self
            .http
            .post(url)
            .header("authorization", &self.api_key)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| AvniError::External(format!("gateway request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(AvniError::External(format!(
                "gateway returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AvniError::External(format!("malformed gateway response: {}", e)))
    }
}

#[async_trait]
impl MessageGateway for GlificGateway {
    async fn send_template_message(
        &self,
        receiver_external_id: &str,
        template_id: &str,
        parameters: &[String],
    ) -> Result<()> {
        let body = fill_send_message(template_id, receiver_external_id, parameters)?;
        self.post("/api/messages", body).await?;
        info!(receiver_external_id, template_id, "template message sent");
        Ok(())
    }

    async fn list_contacts(&self, page: PageRequest) -> Result<Value> {
        self.post("/api/contacts", fill_list_contacts(page)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_message_template_substitution() {
        let body =
            fill_send_message("tmpl-7", "contact-9", &["Asha".into(), "Monday".into()]).unwrap();
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["templateId"], "tmpl-7");
        assert_eq!(parsed["receiverId"], "contact-9");
        assert_eq!(parsed["parameters"], serde_json::json!(["Asha", "Monday"]));
        assert!(!body.contains("${"));
    }

    #[test]
    fn test_list_contacts_template_substitution() {
        let body = fill_list_contacts(PageRequest { offset: 40, limit: 20 });
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["offset"], 40);
        assert_eq!(parsed["limit"], 20);
    }
}
