//! Organisation (tenant) and its configuration blob

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::Audit;

/// A tenant of the platform
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Organisation {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,

    /// Every username in this organisation must end with `@<username_suffix>`
    pub username_suffix: String,

    pub audit: Audit,
    pub voided: bool,
}

/// Recognised organisation config settings
///
/// The set is closed; unknown keys in the stored blob are ignored on read and
/// rejected on write.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum SettingKey {
    languages,
    searchFilters,
    myDashboardFilters,
    lowestAddressLevelType,
    saveDrafts,
    enableComments,
    searchResultFields,
    useMinioForStorage,
    useKeycloakAsIDP,
    skipRuleExecution,
    customRegistrationLocations,
    enableMessaging,
    donotRequirePasswordChangeOnFirstLogin,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::languages => "languages",
            SettingKey::searchFilters => "searchFilters",
            SettingKey::myDashboardFilters => "myDashboardFilters",
            SettingKey::lowestAddressLevelType => "lowestAddressLevelType",
            SettingKey::saveDrafts => "saveDrafts",
            SettingKey::enableComments => "enableComments",
            SettingKey::searchResultFields => "searchResultFields",
            SettingKey::useMinioForStorage => "useMinioForStorage",
            SettingKey::useKeycloakAsIDP => "useKeycloakAsIDP",
            SettingKey::skipRuleExecution => "skipRuleExecution",
            SettingKey::customRegistrationLocations => "customRegistrationLocations",
            SettingKey::enableMessaging => "enableMessaging",
            SettingKey::donotRequirePasswordChangeOnFirstLogin => {
                "donotRequirePasswordChangeOnFirstLogin"
            }
        }
    }
}

/// Per-organisation configuration, stored as a JSON blob
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrganisationConfig {
    pub id: i64,
    pub uuid: Uuid,
    pub organisation_id: i64,
    pub settings: Value,
    pub audit: Audit,
    pub voided: bool,
}

impl OrganisationConfig {
    pub fn new(id: i64, organisation_id: i64) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            organisation_id,
            settings: Value::Object(serde_json::Map::new()),
            audit: Audit::default(),
            voided: false,
        }
    }

    fn setting(&self, key: SettingKey) -> Option<&Value> {
        self.settings.as_object().and_then(|m| m.get(key.as_str()))
    }

    fn bool_setting(&self, key: SettingKey) -> bool {
        self.setting(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Languages enabled for this organisation
    pub fn languages(&self) -> Vec<String> {
        self.setting(SettingKey::languages)
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn messaging_enabled(&self) -> bool {
        self.bool_setting(SettingKey::enableMessaging)
    }

    pub fn use_keycloak_as_idp(&self) -> bool {
        self.bool_setting(SettingKey::useKeycloakAsIDP)
    }

    pub fn skip_password_change_on_first_login(&self) -> bool {
        self.bool_setting(SettingKey::donotRequirePasswordChangeOnFirstLogin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settings_accessors() {
        let mut config = OrganisationConfig::new(1, 1);
        config.settings = json!({
            "languages": ["en", "hi"],
            "enableMessaging": true,
        });

        assert_eq!(config.languages(), vec!["en", "hi"]);
        assert!(config.messaging_enabled());
        assert!(!config.use_keycloak_as_idp());
    }
}
