//! Prediction pipelines
//!
//! Each flow takes records from its source, scores them one at a time through
//! a [`RecordScorer`](crate::scorer::RecordScorer), and writes predictions
//! back. Batch flows are all-or-nothing.

pub mod database;
pub mod file;
pub mod single;

pub use database::{run_database_batch, DbBatchOutcome, DbBatchRequest};
pub use file::{run_file_batch, FileArtifact, FileBatchOutcome, FileUpload};
pub use single::run_single;

use predictor_common::{Error, Result, Table, CANONICAL_FIELDS};

/// Fail unless every canonical field is a column of `table`
pub(crate) fn require_canonical_columns(table: &Table) -> Result<()> {
    let missing: Vec<&str> = CANONICAL_FIELDS
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| table.column_index(name).is_none())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "missing required columns: {}",
            missing.join(", ")
        )))
    }
}
