//! Identity-provider integration
//!
//! Provisioning talks to the IDP through the [`IdpService`] trait so the
//! rest of the server never sees a concrete client. The `none` provider is a
//! no-op used in development and in tests.

mod keycloak;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::Args;
use crate::domain::User;
use crate::types::{AvniError, Result};

pub use keycloak::KeycloakIdp;

/// Configured identity-provider flavour
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdpType {
    None,
    Keycloak,
    Cognito,
    Both,
}

impl FromStr for IdpType {
    type Err = AvniError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(IdpType::None),
            "keycloak" => Ok(IdpType::Keycloak),
            "cognito" => Ok(IdpType::Cognito),
            "both" => Ok(IdpType::Both),
            other => Err(AvniError::Validation(format!(
                "'{}' is not a recognised idp type",
                other
            ))),
        }
    }
}

impl fmt::Display for IdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IdpType::None => "none",
            IdpType::Keycloak => "keycloak",
            IdpType::Cognito => "cognito",
            IdpType::Both => "both",
        };
        f.write_str(s)
    }
}

/// Account operations provisioning needs from the identity provider
#[async_trait]
pub trait IdpService: Send + Sync {
    /// Create the account; must be idempotent for an already-known username
    async fn create_user(&self, user: &User) -> Result<()>;

    /// Push profile changes for an existing account
    async fn update_user(&self, user: &User) -> Result<()>;

    /// Remove the account; a missing account is not an error
    async fn delete_user(&self, username: &str) -> Result<()>;
}

/// Provider used when no IDP is configured
pub struct NoopIdp;

#[async_trait]
impl IdpService for NoopIdp {
    async fn create_user(&self, user: &User) -> Result<()> {
        info!(username = %user.username, "idp disabled, skipping account creation");
        Ok(())
    }

    async fn update_user(&self, _user: &User) -> Result<()> {
        Ok(())
    }

    async fn delete_user(&self, _username: &str) -> Result<()> {
        Ok(())
    }
}

/// Build the configured provider
///
/// Cognito is accepted as a configuration value for compatibility but has no
/// adapter here; selecting it fails at startup rather than at first use.
pub fn build_idp(args: &Args) -> Result<Arc<dyn IdpService>> {
    let idp_type: IdpType = args.idp_type.parse()?;
    match idp_type {
        IdpType::None => Ok(Arc::new(NoopIdp)),
        IdpType::Keycloak => Ok(Arc::new(KeycloakIdp::from_args(args)?)),
        IdpType::Cognito | IdpType::Both => Err(AvniError::Validation(format!(
            "idp type '{}' requires a cognito adapter, which this server does not ship",
            idp_type
        ))),
    }
}
