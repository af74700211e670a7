//! User provisioning
//!
//! Upserts run in three phases: validate and resolve against a read snapshot,
//! call the identity provider, then commit in a single transaction. The IDP
//! call sits between read and commit so a provider failure leaves the
//! registry exactly as it was; the commit re-resolves the username under the
//! write lock because the lock is not held across the await.
//!
//! Re-running an upsert for an already-provisioned user refreshes its audit
//! record and re-asserts its group memberships, nothing else; profile changes
//! travel through dedicated edits, not import reruns.
//!
//! The validate/commit split is public within the crate so the bulk import
//! can run the commit inside its own transaction, together with the row's
//! catchment write.

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    build_settings, Audit, Locale, OperatingIndividualScope, SyncSettings, User, UserGroup,
};
use crate::idp::IdpService;
use crate::messaging::MessageGateway;
use crate::store::{Registry, Tables};
use crate::types::{AvniError, Result};

/// Resolved input of one user upsert
#[derive(Clone, Debug)]
pub struct UserUpsert {
    pub username: String,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub catchment_id: Option<i64>,
    pub locale: Locale,
    pub track_location: bool,
    pub date_picker_mode: String,
    pub show_beneficiary_mode: bool,
    pub id_prefix: String,
    pub sync_settings: SyncSettings,
    /// Names of the groups the user belongs to
    pub groups: Vec<String>,
}

/// Create or refresh the user named by `request.username`
pub async fn upsert_user(
    registry: &Registry,
    idp: &dyn IdpService,
    gateway: &dyn MessageGateway,
    organisation_id: i64,
    request: &UserUpsert,
    actor: Option<i64>,
) -> Result<User> {
    let existing_id = registry.read(|t| validate_upsert(t, organisation_id, request))?;

    // existing users skip the idp, reruns only refresh audit
    if existing_id.is_none() {
        idp.create_user(&build_user(organisation_id, request)).await?;
    }

    let user = registry.transaction(|t| commit_upsert(t, organisation_id, request, actor))?;
    match existing_id {
        Some(_) => info!(username = %user.username, "existing user refreshed"),
        None => info!(username = %user.username, user_id = user.id, "user provisioned"),
    }

    onboard_for_messaging(registry, gateway, &user, actor).await;
    Ok(user)
}

/// Phase 1: check the request against a read snapshot
///
/// Returns the id of the already-provisioned user, if any.
pub(crate) fn validate_upsert(
    tables: &Tables,
    organisation_id: i64,
    request: &UserUpsert,
) -> Result<Option<i64>> {
    let organisation = tables
        .organisations
        .get(&organisation_id)
        .ok_or_else(|| AvniError::NotFound(format!("Organisation {} not found", organisation_id)))?;
    User::validate_username(&request.username, &organisation.username_suffix)?;
    User::validate_email(&request.email)?;
    User::validate_phone_number(&request.phone_number)?;
    if let Some(config) = tables.organisation_config_of(organisation_id) {
        let languages = config.languages();
        if !languages.is_empty() && !languages.iter().any(|l| l == request.locale.as_str()) {
            return Err(AvniError::Validation(format!(
                "Language '{}' is not enabled for this organisation",
                request.locale.as_str()
            )));
        }
    }
    if let Some(catchment_id) = request.catchment_id {
        if !tables.catchments.contains_key(&catchment_id) {
            return Err(AvniError::NotFound(format!(
                "Catchment {} not found",
                catchment_id
            )));
        }
    }
    for name in &request.groups {
        let name = name.trim();
        if !name.is_empty() && tables.group_by_name(organisation_id, name).is_none() {
            return Err(AvniError::Validation(format!("Group '{}' not found", name)));
        }
    }

    match tables.user_by_username(&request.username) {
        Some(user) if user.organisation_id == organisation_id => Ok(Some(user.id)),
        Some(_) => Err(AvniError::Conflict(format!(
            "Username '{}' belongs to another organisation",
            request.username
        ))),
        None => Ok(None),
    }
}

/// The user row the request describes, without an id or audit yet
pub(crate) fn build_user(organisation_id: i64, request: &UserUpsert) -> User {
    let mut user = User::new(0, &request.username, organisation_id);
    user.uuid = Uuid::new_v4();
    user.name = request.name.clone();
    user.email = request.email.clone();
    user.phone_number = request.phone_number.clone();
    user.catchment_id = request.catchment_id;
    user.operating_individual_scope = match request.catchment_id {
        Some(_) => OperatingIndividualScope::ByCatchment,
        None => OperatingIndividualScope::None,
    };
    user.settings = client_settings(request);
    user.sync_settings = request.sync_settings.clone();
    user
}

/// Phase 3: write the user and its group memberships
///
/// Re-resolves the username under the write lock; a row that appeared since
/// validation is treated as the existing user and refreshed.
pub(crate) fn commit_upsert(
    tables: &mut Tables,
    organisation_id: i64,
    request: &UserUpsert,
    actor: Option<i64>,
) -> Result<User> {
    let existing = tables
        .user_by_username(&request.username)
        .map(|u| (u.id, u.organisation_id));
    let user = match existing {
        Some((id, org)) if org == organisation_id => {
            let user = tables
                .users
                .get_mut(&id)
                .ok_or_else(|| AvniError::internal(anyhow::anyhow!("user row vanished")))?;
            user.audit.bump(actor);
            user.clone()
        }
        Some(_) => {
            return Err(AvniError::Conflict(format!(
                "Username '{}' belongs to another organisation",
                request.username
            )))
        }
        None => {
            if let Some(catchment_id) = request.catchment_id {
                if !tables.catchments.contains_key(&catchment_id) {
                    return Err(AvniError::NotFound(format!(
                        "Catchment {} not found",
                        catchment_id
                    )));
                }
            }
            let id = tables.next_id();
            let mut user = build_user(organisation_id, request);
            user.id = id;
            user.audit = Audit::new(actor);
            tables.users.insert(id, user.clone());
            user
        }
    };

    join_groups(tables, organisation_id, user.id, &request.groups, actor)?;
    Ok(user)
}

/// Put the user into each named group, reviving a voided membership if found
fn join_groups(
    tables: &mut Tables,
    organisation_id: i64,
    user_id: i64,
    names: &[String],
    actor: Option<i64>,
) -> Result<()> {
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let group_id = tables
            .group_by_name(organisation_id, name)
            .map(|g| g.id)
            .ok_or_else(|| AvniError::Validation(format!("Group '{}' not found", name)))?;

        let existing = tables
            .user_groups
            .values()
            .find(|ug| ug.user_id == user_id && ug.group_id == group_id)
            .map(|ug| (ug.id, ug.voided));
        match existing {
            Some((_, false)) => {}
            Some((id, true)) => {
                let row = tables.user_groups.get_mut(&id).ok_or_else(|| {
                    AvniError::internal(anyhow::anyhow!("user group row vanished"))
                })?;
                row.voided = false;
                row.audit.bump(actor);
            }
            None => {
                let id = tables.next_id();
                tables.user_groups.insert(
                    id,
                    UserGroup {
                        id,
                        uuid: Uuid::new_v4(),
                        user_id,
                        group_id,
                        audit: Audit::new(actor),
                        voided: false,
                    },
                );
            }
        }
    }
    Ok(())
}

/// Register the user with the messaging provider when the organisation has
/// messaging turned on; a provider fault is logged, never fails the upsert
pub(crate) async fn onboard_for_messaging(
    registry: &Registry,
    gateway: &dyn MessageGateway,
    user: &User,
    actor: Option<i64>,
) {
    let enabled = registry.read(|t| {
        t.organisation_config_of(user.organisation_id)
            .map(|c| c.messaging_enabled())
            .unwrap_or(false)
    });
    if !enabled {
        return;
    }
    if let Err(e) = crate::messaging::onboard_user(registry, gateway, user, actor).await {
        warn!(username = %user.username, error = %e, "messaging onboarding failed");
    }
}

fn client_settings(request: &UserUpsert) -> Value {
    build_settings(
        request.locale,
        request.track_location,
        &request.date_picker_mode,
        request.show_beneficiary_mode,
        &request.id_prefix,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Group, Organisation};
    use crate::idp::NoopIdp;
    use crate::messaging::NoopGateway;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingIdp {
        created: AtomicUsize,
    }

    #[async_trait]
    impl IdpService for CountingIdp {
        async fn create_user(&self, _user: &User) -> Result<()> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn update_user(&self, _user: &User) -> Result<()> {
            Ok(())
        }
        async fn delete_user(&self, _username: &str) -> Result<()> {
            Ok(())
        }
    }

    struct FailingIdp;

    #[async_trait]
    impl IdpService for FailingIdp {
        async fn create_user(&self, _user: &User) -> Result<()> {
            Err(AvniError::External("keycloak unreachable".into()))
        }
        async fn update_user(&self, _user: &User) -> Result<()> {
            Ok(())
        }
        async fn delete_user(&self, _username: &str) -> Result<()> {
            Ok(())
        }
    }

    fn registry_with_org() -> (Registry, i64) {
        let registry = Registry::new();
        let org_id = registry
            .transaction(|t| {
                let id = t.next_id();
                t.organisations.insert(
                    id,
                    Organisation {
                        id,
                        uuid: Uuid::new_v4(),
                        name: "Demo".into(),
                        username_suffix: "demo".into(),
                        audit: Audit::default(),
                        voided: false,
                    },
                );
                Ok(id)
            })
            .unwrap();
        (registry, org_id)
    }

    fn add_group(registry: &Registry, org_id: i64, name: &str) -> i64 {
        registry
            .transaction(|t| {
                let id = t.next_id();
                t.groups.insert(
                    id,
                    Group {
                        id,
                        uuid: Uuid::new_v4(),
                        name: name.into(),
                        organisation_id: org_id,
                        audit: Audit::default(),
                        voided: false,
                    },
                );
                Ok(id)
            })
            .unwrap()
    }

    fn request(username: &str) -> UserUpsert {
        UserUpsert {
            username: username.into(),
            name: "Asha Worker".into(),
            email: "asha@example.org".into(),
            phone_number: "+919876543210".into(),
            catchment_id: None,
            locale: Locale::Hi,
            track_location: true,
            date_picker_mode: String::new(),
            show_beneficiary_mode: false,
            id_prefix: String::new(),
            sync_settings: SyncSettings::default(),
            groups: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_new_user_is_created_with_settings_blob() {
        let (registry, org_id) = registry_with_org();
        let user = upsert_user(
            &registry,
            &NoopIdp,
            &NoopGateway,
            org_id,
            &request("asha@demo"),
            None,
        )
        .await
        .unwrap();

        assert!(user.id > 0);
        assert_eq!(user.settings.get("locale").unwrap(), "hi");
        assert!(user.settings.get("datePickerMode").is_none());
        assert_eq!(user.operating_individual_scope, OperatingIndividualScope::None);
        assert!(registry.read(|t| t.user_by_username("asha@demo").is_some()));
    }

    #[tokio::test]
    async fn test_idp_failure_leaves_registry_unchanged() {
        let (registry, org_id) = registry_with_org();
        let err = upsert_user(
            &registry,
            &FailingIdp,
            &NoopGateway,
            org_id,
            &request("asha@demo"),
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AvniError::External(_)));
        assert!(registry.read(|t| t.users.is_empty()));
    }

    #[tokio::test]
    async fn test_rerun_refreshes_audit_without_second_idp_call() {
        let (registry, org_id) = registry_with_org();
        let idp = CountingIdp { created: AtomicUsize::new(0) };

        let first = upsert_user(&registry, &idp, &NoopGateway, org_id, &request("asha@demo"), None)
            .await
            .unwrap();

        let mut changed = request("asha@demo");
        changed.locale = Locale::En;
        let second = upsert_user(&registry, &idp, &NoopGateway, org_id, &changed, None)
            .await
            .unwrap();

        assert_eq!(idp.created.load(Ordering::SeqCst), 1);
        assert_eq!(first.id, second.id);
        assert!(second.audit.last_modified_at > first.audit.last_modified_at);
        // the stored settings are untouched by the rerun
        assert_eq!(second.settings.get("locale").unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_named_groups_are_joined_idempotently() {
        let (registry, org_id) = registry_with_org();
        let group_id = add_group(&registry, org_id, "Field Workers");

        let mut with_group = request("asha@demo");
        with_group.groups = vec!["Field Workers".into()];
        let user = upsert_user(&registry, &NoopIdp, &NoopGateway, org_id, &with_group, None)
            .await
            .unwrap();
        upsert_user(&registry, &NoopIdp, &NoopGateway, org_id, &with_group, None)
            .await
            .unwrap();

        registry.read(|t| {
            let memberships: Vec<_> = t
                .user_groups
                .values()
                .filter(|ug| !ug.voided && ug.user_id == user.id && ug.group_id == group_id)
                .collect();
            assert_eq!(memberships.len(), 1);
        });
    }

    #[tokio::test]
    async fn test_unknown_group_is_rejected_before_the_idp() {
        let (registry, org_id) = registry_with_org();
        let mut with_group = request("asha@demo");
        with_group.groups = vec!["Nursing".into()];

        let err = upsert_user(&registry, &FailingIdp, &NoopGateway, org_id, &with_group, None)
            .await
            .unwrap_err();
        // a validation error, not the idp failure: the group check ran first
        assert!(matches!(err, AvniError::Validation(_)));
        assert!(err.to_string().contains("Nursing"));
    }

    #[tokio::test]
    async fn test_messaging_enabled_org_registers_a_receiver() {
        let (registry, org_id) = registry_with_org();
        registry
            .transaction(|t| {
                let id = t.next_id();
                let mut config = crate::domain::OrganisationConfig::new(id, org_id);
                config.settings = serde_json::json!({"enableMessaging": true});
                t.organisation_configs.insert(id, config);
                Ok(())
            })
            .unwrap();

        let user = upsert_user(
            &registry,
            &NoopIdp,
            &NoopGateway,
            org_id,
            &request("asha@demo"),
            None,
        )
        .await
        .unwrap();

        assert!(registry.read(|t| t.message_receiver_by_entity(user.id).is_some()));
    }

    #[tokio::test]
    async fn test_locale_outside_organisation_languages_is_rejected() {
        let (registry, org_id) = registry_with_org();
        registry
            .transaction(|t| {
                let id = t.next_id();
                let mut config = crate::domain::OrganisationConfig::new(id, org_id);
                config.settings = serde_json::json!({"languages": ["en"]});
                t.organisation_configs.insert(id, config);
                Ok(())
            })
            .unwrap();

        let err = upsert_user(
            &registry,
            &NoopIdp,
            &NoopGateway,
            org_id,
            &request("asha@demo"),
            None,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not enabled"));
    }

    #[tokio::test]
    async fn test_bad_username_suffix_is_rejected_before_the_idp() {
        let (registry, org_id) = registry_with_org();
        let err = upsert_user(
            &registry,
            &FailingIdp,
            &NoopGateway,
            org_id,
            &request("asha@other"),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AvniError::Validation(_)));
    }
}
