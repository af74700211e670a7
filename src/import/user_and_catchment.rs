//! User-and-catchment bulk import
//!
//! Each row carries a location (full hierarchy), a catchment name, the user's
//! profile columns, a comma-separated `User Groups` cell and any number of
//! compound sync-attribute columns (`<subject type>-><concept>`). Validation
//! errors for one row are collected and reported together, joined with ", ",
//! so a data person fixes a row once rather than once per error.
//!
//! Everything a row writes — catchment, user, group memberships — commits in
//! one transaction, so a failed row leaves no trace.

use tracing::info;

use crate::domain::Locale;
use crate::idp::IdpService;
use crate::locations;
use crate::messaging::MessageGateway;
use crate::store::Registry;
use crate::types::{AvniError, Result};
use crate::users::{
    build_sync_settings, build_user, commit_upsert, is_sync_attribute_header,
    onboard_for_messaging, validate_upsert, UserUpsert,
};

use super::{ImportSummary, Row};

const LOCATION: &str = "Location with full hierarchy";
const CATCHMENT: &str = "Catchment Name";
const USERNAME: &str = "Username";
const FULL_NAME: &str = "Full Name of User";
const EMAIL: &str = "Email";
const PHONE: &str = "Phone";
const LANGUAGE: &str = "Language";
const TRACK_LOCATION: &str = "Track Location";
const DATE_PICKER_MODE: &str = "Date picker mode";
const BENEFICIARY_MODE: &str = "Enable Beneficiary mode";
const ID_PREFIX: &str = "Beneficiary ID Prefix";
const USER_GROUPS: &str = "User Groups";

/// Import a batch of user rows
pub async fn import_user_rows(
    registry: &Registry,
    idp: &dyn IdpService,
    gateway: &dyn MessageGateway,
    organisation_id: i64,
    rows: &[Row],
    actor: Option<i64>,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    for (index, row) in rows.iter().enumerate() {
        let result = import_row(registry, idp, gateway, organisation_id, row, actor).await;
        summary.record(index + 1, result)?;
    }
    info!(
        total = summary.total,
        imported = summary.imported,
        failed = summary.errors.len(),
        "user import finished"
    );
    Ok(summary)
}

async fn import_row(
    registry: &Registry,
    idp: &dyn IdpService,
    gateway: &dyn MessageGateway,
    organisation_id: i64,
    row: &Row,
    actor: Option<i64>,
) -> Result<()> {
    let mut problems: Vec<String> = Vec::new();

    let locale = match Locale::value_by_name(row.get(LANGUAGE)) {
        Ok(locale) => locale,
        Err(e) => {
            problems.push(e.to_string());
            Locale::En
        }
    };
    let track_location = row
        .get_bool(TRACK_LOCATION)
        .unwrap_or_else(|e| {
            problems.push(e.to_string());
            false
        });
    let show_beneficiary_mode = row
        .get_bool(BENEFICIARY_MODE)
        .unwrap_or_else(|e| {
            problems.push(e.to_string());
            false
        });

    let sync_entries: Vec<(String, String)> = row
        .headers()
        .filter(|h| is_sync_attribute_header(h))
        .map(|h| (h.to_string(), row.get(h).to_string()))
        .collect();
    let sync_settings = registry.read(|t| build_sync_settings(t, &sync_entries));
    let sync_settings = match sync_settings {
        Ok(settings) => settings,
        Err(e) => {
            problems.push(e.to_string());
            Default::default()
        }
    };

    let groups: Vec<String> = row
        .get(USER_GROUPS)
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect();

    // the catchment id is only known inside the commit transaction
    let request = UserUpsert {
        username: row.get(USERNAME).to_string(),
        name: row.get(FULL_NAME).to_string(),
        email: row.get(EMAIL).to_string(),
        phone_number: row.get(PHONE).to_string(),
        catchment_id: None,
        locale,
        track_location,
        date_picker_mode: row.get(DATE_PICKER_MODE).to_string(),
        show_beneficiary_mode,
        id_prefix: row.get(ID_PREFIX).to_string(),
        sync_settings,
        groups,
    };

    let existing_id = registry.read(|t| {
        if let Err(e) = locations::locate(t, row.get(LOCATION)) {
            problems.push(e.to_string());
        }
        if row.get(CATCHMENT).is_empty() {
            problems.push("Catchment name must not be blank".into());
        }
        match validate_upsert(t, organisation_id, &request) {
            Ok(existing_id) => existing_id,
            Err(e) => {
                problems.push(e.to_string());
                None
            }
        }
    });
    if !problems.is_empty() {
        return Err(AvniError::Validation(problems.join(", ")));
    }

    if existing_id.is_none() {
        idp.create_user(&build_user(organisation_id, &request)).await?;
    }

    // one transaction per row: catchment, user and group joins land together
    let user = registry.transaction(|t| {
        let level_id = locations::locate(t, row.get(LOCATION))?.id;
        let catchment_id =
            locations::attach_to_catchment(t, organisation_id, row.get(CATCHMENT), level_id, actor)?;
        let mut request = request.clone();
        request.catchment_id = Some(catchment_id);
        commit_upsert(t, organisation_id, &request, actor)
    })?;
    onboard_for_messaging(registry, gateway, &user, actor).await;
    Ok(())
}
