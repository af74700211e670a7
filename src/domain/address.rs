//! Address-level hierarchy and catchments

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Audit;

/// Node in the rooted location tree
///
/// `title_lineage` is the full comma-separated path from the root, e.g.
/// `"India, Maharashtra, Pune"`, and is the lookup key for bulk imports.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AddressLevel {
    pub id: i64,
    pub uuid: Uuid,
    pub title: String,
    pub level_type: String,
    pub parent_id: Option<i64>,
    pub title_lineage: String,
    pub audit: Audit,
    pub voided: bool,
}

/// Named set of address-level leaves a user may work in
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Catchment {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub organisation_id: i64,
    pub address_level_ids: Vec<i64>,
    pub audit: Audit,
    pub voided: bool,
}

impl Catchment {
    pub fn new(id: i64, name: &str, organisation_id: i64) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            organisation_id,
            address_level_ids: Vec::new(),
            audit: Audit::default(),
            voided: false,
        }
    }

    /// Add an address level, preserving insertion order; idempotent
    pub fn add_address_level(&mut self, address_level_id: i64) -> bool {
        if self.address_level_ids.contains(&address_level_id) {
            return false;
        }
        self.address_level_ids.push(address_level_id);
        true
    }

    pub fn contains(&self, address_level_id: i64) -> bool {
        self.address_level_ids.contains(&address_level_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_address_level_is_idempotent() {
        let mut catchment = Catchment::new(1, "Pune-North", 1);
        assert!(catchment.add_address_level(10));
        assert!(!catchment.add_address_level(10));
        assert_eq!(catchment.address_level_ids, vec![10]);
    }
}
