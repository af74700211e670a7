//! Bulk imports
//!
//! Imports arrive as tabular rows. Each row is processed independently: a
//! failing row is reported with its row number and the batch moves on, except
//! for internal faults, which abort the batch. Row numbers in summaries are
//! 1-based and count data rows, not the header.

mod group_subject;
mod row;
mod user_and_catchment;

pub use group_subject::import_group_subject_rows;
pub use row::Row;
pub use user_and_catchment::import_user_rows;

use serde::Serialize;

use crate::types::AvniError;

/// One failed row of a batch
#[derive(Serialize, Clone, Debug)]
pub struct RowError {
    pub row_number: usize,
    pub message: String,
}

/// Outcome of a whole batch
#[derive(Serialize, Clone, Debug, Default)]
pub struct ImportSummary {
    pub total: usize,
    pub imported: usize,
    pub errors: Vec<RowError>,
}

impl ImportSummary {
    pub(crate) fn record(&mut self, row_number: usize, result: crate::types::Result<()>) -> crate::types::Result<()> {
        self.total += 1;
        match result {
            Ok(()) => {
                self.imported += 1;
                Ok(())
            }
            // internal faults are not row problems; stop the batch
            Err(e @ AvniError::Internal { .. }) => Err(e),
            Err(e) => {
                self.errors.push(RowError {
                    row_number,
                    message: e.to_string(),
                });
                Ok(())
            }
        }
    }
}
