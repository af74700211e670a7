//! Location and catchment service
//!
//! Locates address levels by full title lineage (case-insensitively, ignoring
//! whitespace around segments) and maintains named catchments. A catchment is
//! created on first mention and extended on later mentions; extension never
//! removes levels already attached.

use crate::domain::{AddressLevel, Catchment};
use crate::store::Tables;
use crate::types::{AvniError, Result};

/// Resolve a full title lineage such as `"India, Maharashtra, Pune"`
pub fn locate<'a>(tables: &'a Tables, title_lineage: &str) -> Result<&'a AddressLevel> {
    tables
        .address_level_by_lineage(title_lineage)
        .ok_or_else(|| {
            AvniError::Validation(format!(
                "Provided Location does not exist in Avni. Please add it or check that \
                 the location name is same as in Avni: '{}'",
                title_lineage
            ))
        })
}

/// Attach `address_level_id` to the named catchment, creating it if absent
///
/// Returns the catchment id. Safe to call repeatedly with the same pair.
pub fn attach_to_catchment(
    tables: &mut Tables,
    organisation_id: i64,
    catchment_name: &str,
    address_level_id: i64,
    actor: Option<i64>,
) -> Result<i64> {
    let name = catchment_name.trim();
    if name.is_empty() {
        return Err(AvniError::Validation("Catchment name must not be blank".into()));
    }

    if let Some(existing_id) = tables
        .catchment_by_name(organisation_id, name)
        .map(|c| c.id)
    {
        let catchment = tables
            .catchments
            .get_mut(&existing_id)
            .ok_or_else(|| AvniError::internal(anyhow::anyhow!("catchment row vanished")))?;
        if catchment.add_address_level(address_level_id) {
            catchment.audit.bump(actor);
        }
        return Ok(existing_id);
    }

    let id = tables.next_id();
    let mut catchment = Catchment::new(id, name, organisation_id);
    catchment.add_address_level(address_level_id);
    catchment.audit = crate::domain::Audit::new(actor);
    tables.catchments.insert(id, catchment);
    Ok(id)
}
