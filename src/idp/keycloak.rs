//! Keycloak admin-API adapter
//!
//! Authenticates with the client-credentials grant and caches the admin
//! token until shortly before expiry. Calls that come back 401 refresh the
//! token and retry once; any further failure surfaces as an external error.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::domain::User;
use crate::types::{AvniError, Result};

use super::IdpService;

/// Refresh this long before the token actually expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct KeycloakUser {
    id: String,
}

pub struct KeycloakIdp {
    http: reqwest::Client,
    base_url: String,
    realm: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl KeycloakIdp {
    pub fn from_args(args: &Args) -> Result<Self> {
        let base_url = args
            .keycloak_server
            .clone()
            .ok_or_else(|| AvniError::Validation("keycloak server url is not configured".into()))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            realm: args.keycloak_realm.clone(),
            client_id: args.keycloak_client_id.clone(),
            client_secret: args.keycloak_client_secret.clone().unwrap_or_default(),
            token: Mutex::new(None),
        })
    }

    async fn admin_token(&self, force_refresh: bool) -> Result<String> {
        let mut cached = self.token.lock().await;
        if !force_refresh {
            if let Some(token) = cached.as_ref() {
                if token.expires_at > Instant::now() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let url = format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base_url, self.realm
        );
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AvniError::External(format!("keycloak token request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(AvniError::External(format!(
                "keycloak token request returned {}",
                response.status()
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AvniError::External(format!("malformed keycloak token response: {}", e)))?;

        let expires_at = Instant::now()
            + Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at,
        });
        Ok(token.access_token)
    }

    /// Send `build(token)`, refreshing the token and retrying once on 401
    async fn send_authorized(
        &self,
        build: impl Fn(&str) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let token = self.admin_token(false).await?;
        let response = build(&token)
            .send()
            .await
            .map_err(|e| AvniError::External(format!("keycloak request failed: {}", e)))?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("keycloak admin token rejected, refreshing and retrying");
        let token = self.admin_token(true).await?;
        build(&token)
            .send()
            .await
            .map_err(|e| AvniError::External(format!("keycloak request failed: {}", e)))
    }

    fn users_url(&self) -> String {
        format!("{}/admin/realms/{}/users", self.base_url, self.realm)
    }

    async fn find_user_id(&self, username: &str) -> Result<Option<String>> {
        let url = self.users_url();
        let response = self
            .send_authorized(|token| {
                self.http
                    .get(&url)
                    .bearer_auth(token)
                    .query(&[("username", username), ("exact", "true")])
            })
            .await?;
        if !response.status().is_success() {
            return Err(AvniError::External(format!(
                "keycloak user lookup returned {}",
                response.status()
            )));
        }
        let matches: Vec<KeycloakUser> = response
            .json()
            .await
            .map_err(|e| AvniError::External(format!("malformed keycloak user list: {}", e)))?;
        Ok(matches.into_iter().next().map(|u| u.id))
    }

    fn representation(user: &User) -> serde_json::Value {
        json!({
            "username": user.username,
            "firstName": user.name,
            "email": user.email,
            "enabled": !user.voided,
            "attributes": {
                "phoneNumber": [user.phone_number],
                "userUUID": [user.uuid.to_string()],
            },
        })
    }

    /// Temporary first-login password, derived from the username's local part
    fn default_password(username: &str) -> String {
        let local = username.split('@').next().unwrap_or(username);
        format!("{}1234", local)
    }
}

#[async_trait::async_trait]
impl IdpService for KeycloakIdp {
    async fn create_user(&self, user: &User) -> Result<()> {
        let url = self.users_url();
        let mut body = Self::representation(user);
        body["credentials"] = json!([{
            "type": "password",
            "value": Self::default_password(&user.username),
            "temporary": true,
        }]);
        let response = self
            .send_authorized(|token| self.http.post(&url).bearer_auth(token).json(&body))
            .await?;

        match response.status() {
            StatusCode::CONFLICT => {
                info!(username = %user.username, "keycloak account already exists");
                Ok(())
            }
            status if status.is_success() => {
                info!(username = %user.username, "keycloak account created");
                Ok(())
            }
            status => Err(AvniError::External(format!(
                "keycloak account creation returned {}",
                status
            ))),
        }
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let id = self.find_user_id(&user.username).await?.ok_or_else(|| {
            AvniError::External(format!(
                "keycloak has no account for '{}'",
                user.username
            ))
        })?;

        let url = format!("{}/{}", self.users_url(), id);
        let body = Self::representation(user);
        let response = self
            .send_authorized(|token| self.http.put(&url).bearer_auth(token).json(&body))
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AvniError::External(format!(
                "keycloak account update returned {}",
                response.status()
            )))
        }
    }

    async fn delete_user(&self, username: &str) -> Result<()> {
        let Some(id) = self.find_user_id(username).await? else {
            info!(username, "keycloak has no account to delete");
            return Ok(());
        };

        let url = format!("{}/{}", self.users_url(), id);
        let response = self
            .send_authorized(|token| self.http.delete(&url).bearer_auth(token))
            .await?;
        if response.status().is_success() {
            info!(username, "keycloak account deleted");
            Ok(())
        } else {
            error!(username, status = %response.status(), "keycloak account deletion failed");
            Err(AvniError::External(format!(
                "keycloak account deletion returned {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_password_uses_the_local_part() {
        assert_eq!(KeycloakIdp::default_password("asha@demo"), "asha1234");
        assert_eq!(KeycloakIdp::default_password("plain"), "plain1234");
    }
}
