//! Users, their settings blob and sync settings
//!
//! A user's username is globally unique and must end with the owning
//! organisation's `@<username_suffix>`. The `settings` and `sync_settings`
//! blobs are stored as JSON columns with the exact key shapes the mobile
//! client consumes.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::types::{AvniError, Result};

use super::Audit;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email pattern")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9][0-9]{7,14}$").expect("phone pattern"));

/// Supported client locales; the token in import rows is matched
/// case-insensitively against the variant name
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Hi,
    Mr,
    Gu,
    Bn,
    Ta,
    Te,
    Kn,
    Ml,
    As,
}

impl Locale {
    /// Resolve a language token; empty maps to `En`
    pub fn value_by_name(token: &str) -> Result<Locale> {
        if token.trim().is_empty() {
            return Ok(Locale::En);
        }
        match token.trim().to_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "hi" => Ok(Locale::Hi),
            "mr" => Ok(Locale::Mr),
            "gu" => Ok(Locale::Gu),
            "bn" => Ok(Locale::Bn),
            "ta" => Ok(Locale::Ta),
            "te" => Ok(Locale::Te),
            "kn" => Ok(Locale::Kn),
            "ml" => Ok(Locale::Ml),
            "as" => Ok(Locale::As),
            other => Err(AvniError::Validation(format!(
                "'{}' is not a supported language",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Hi => "hi",
            Locale::Mr => "mr",
            Locale::Gu => "gu",
            Locale::Bn => "bn",
            Locale::Ta => "ta",
            Locale::Te => "te",
            Locale::Kn => "kn",
            Locale::Ml => "ml",
            Locale::As => "as",
        }
    }
}

/// How a user's visible subject universe is determined
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatingIndividualScope {
    None,
    ByCatchment,
}

/// Per-subject-type sync predicate values for one user
///
/// Serialized field names are the wire shape the mobile client expects.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserSyncSettings {
    #[serde(rename = "subjectTypeUUID")]
    pub subject_type_uuid: Uuid,

    #[serde(rename = "syncConcept1", skip_serializing_if = "Option::is_none")]
    pub sync_concept_1: Option<Uuid>,

    /// Answer-concept UUIDs for coded sync concepts, raw values otherwise
    #[serde(rename = "syncConcept1Values", default)]
    pub sync_concept_1_values: Vec<String>,

    #[serde(rename = "syncConcept2", skip_serializing_if = "Option::is_none")]
    pub sync_concept_2: Option<Uuid>,

    #[serde(rename = "syncConcept2Values", default)]
    pub sync_concept_2_values: Vec<String>,
}

impl UserSyncSettings {
    pub fn new(subject_type_uuid: Uuid) -> Self {
        Self {
            subject_type_uuid,
            sync_concept_1: None,
            sync_concept_1_values: Vec::new(),
            sync_concept_2: None,
            sync_concept_2_values: Vec::new(),
        }
    }
}

/// The `syncSettings` JSON blob on a user
///
/// Serializes to `{}` when no subject type carries settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SyncSettings {
    #[serde(
        rename = "subjectTypeSyncSettings",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub subject_type_sync_settings: Vec<UserSyncSettings>,
}

impl SyncSettings {
    pub fn is_empty(&self) -> bool {
        self.subject_type_sync_settings.is_empty()
    }

    /// Settings for one subject type, if present
    pub fn for_subject_type(&self, subject_type_uuid: Uuid) -> Option<&UserSyncSettings> {
        self.subject_type_sync_settings
            .iter()
            .find(|s| s.subject_type_uuid == subject_type_uuid)
    }
}

/// A provisioned user of the platform
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct User {
    pub id: i64,
    pub uuid: Uuid,
    pub username: String,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub organisation_id: i64,
    pub catchment_id: Option<i64>,
    pub operating_individual_scope: OperatingIndividualScope,

    /// Client settings blob (`locale`, `trackLocation`, ...)
    pub settings: Value,

    pub sync_settings: SyncSettings,

    /// Whether the user may administer the organisation
    pub org_admin: bool,

    pub audit: Audit,
    pub voided: bool,
}

impl User {
    pub fn new(id: i64, username: &str, organisation_id: i64) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            username: username.to_string(),
            name: String::new(),
            email: String::new(),
            phone_number: String::new(),
            organisation_id,
            catchment_id: None,
            operating_individual_scope: OperatingIndividualScope::None,
            settings: json!({}),
            sync_settings: SyncSettings::default(),
            org_admin: false,
            audit: Audit::default(),
            voided: false,
        }
    }

    /// Enforce `^[^@]+@<suffix>$`
    pub fn validate_username(username: &str, suffix: &str) -> Result<()> {
        let expected = format!("@{}", suffix);
        let valid = username.ends_with(&expected)
            && username.len() > expected.len()
            && !username[..username.len() - expected.len()].contains('@');
        if valid {
            Ok(())
        } else {
            Err(AvniError::Validation(format!(
                "Invalid username '{}'. Username must end with {}",
                username, expected
            )))
        }
    }

    /// RFC-5322 subset; empty is rejected
    pub fn validate_email(email: &str) -> Result<()> {
        if EMAIL_RE.is_match(email) {
            Ok(())
        } else {
            Err(AvniError::Validation(format!(
                "Invalid email address {}",
                email
            )))
        }
    }

    /// E.164 or empty
    pub fn validate_phone_number(phone: &str) -> Result<()> {
        if phone.is_empty() || PHONE_RE.is_match(phone) {
            Ok(())
        } else {
            Err(AvniError::Validation(format!(
                "Provided phone number is invalid: {}",
                phone
            )))
        }
    }
}

/// Build the client `settings` blob from its fixed keys
///
/// `datePickerMode` and `idPrefix` are omitted when empty.
pub fn build_settings(
    locale: Locale,
    track_location: bool,
    date_picker_mode: &str,
    show_beneficiary_mode: bool,
    id_prefix: &str,
) -> Value {
    let mut settings = serde_json::Map::new();
    settings.insert("locale".into(), json!(locale.as_str()));
    settings.insert("trackLocation".into(), json!(track_location));
    if !date_picker_mode.is_empty() {
        settings.insert("datePickerMode".into(), json!(date_picker_mode));
    }
    settings.insert("showBeneficiaryMode".into(), json!(show_beneficiary_mode));
    if !id_prefix.is_empty() {
        settings.insert("idPrefix".into(), json!(id_prefix));
    }
    Value::Object(settings)
}
