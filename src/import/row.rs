//! Tabular row access
//!
//! Header matching is exact; cell access always trims, and a missing column
//! reads as an empty cell so optional columns need no special casing.

use crate::types::{AvniError, Result};

/// One data row of an import file
#[derive(Clone, Debug)]
pub struct Row {
    headers: Vec<String>,
    values: Vec<String>,
}

impl Row {
    pub fn new(headers: Vec<String>, values: Vec<String>) -> Self {
        Self { headers, values }
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(String::as_str)
    }

    /// Trimmed cell under `header`, empty if the column is absent
    pub fn get(&self, header: &str) -> &str {
        self.headers
            .iter()
            .position(|h| h.trim() == header.trim())
            .and_then(|i| self.values.get(i))
            .map(|v| v.trim())
            .unwrap_or("")
    }

    /// Boolean cell; empty reads as `false`
    pub fn get_bool(&self, header: &str) -> Result<bool> {
        match self.get(header).to_lowercase().as_str() {
            "" | "false" | "no" => Ok(false),
            "true" | "yes" => Ok(true),
            other => Err(AvniError::Validation(format!(
                "Invalid '{}' value '{}'; expected yes or no",
                header, other
            ))),
        }
    }
}
