//! File flow: append a prediction column to an uploaded CSV/XLSX table
//!
//! The upload is stored in a caller-provided scratch directory and removed as
//! soon as it has been parsed. The output file is only written once every row
//! has been scored.

use predictor_common::{normalize, Cell, CollectorHandle, Error, Result, Table};
use std::path::{Path, PathBuf};
use tracing::Instrument;
use uuid::Uuid;

use super::require_canonical_columns;
use crate::files::{read_table, sanitize_filename, write_table, FileFormat};
use crate::scorer::RecordScorer;

/// An uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Prediction file written into the scratch directory
#[derive(Debug, Clone, PartialEq)]
pub struct FileArtifact {
    pub filename: String,
    pub format: FileFormat,
    pub path: PathBuf,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileBatchOutcome {
    NothingToPredict,
    Written(FileArtifact),
}

pub async fn run_file_batch(
    scratch: &Path,
    upload: FileUpload,
    target_column: &str,
    scorer: &dyn RecordScorer,
    collector: &CollectorHandle,
) -> Result<FileBatchOutcome> {
    let batch_id = Uuid::new_v4();
    let span = tracing::info_span!("file_batch", %batch_id, filename = %upload.filename);

    async move {
        collector.info("entering file_prediction");

        let result = execute(scratch, upload, target_column, scorer).await;
        match &result {
            Ok(FileBatchOutcome::Written(artifact)) => collector.info(format!(
                "file_prediction wrote {} rows to {}",
                artifact.rows, artifact.filename
            )),
            Ok(FileBatchOutcome::NothingToPredict) => collector.info("Nothing to predict"),
            Err(e) => collector.critical(e.to_string()),
        }

        collector.info("exiting file_prediction");
        result
    }
    .instrument(span)
    .await
}

async fn execute(
    scratch: &Path,
    upload: FileUpload,
    target_column: &str,
    scorer: &dyn RecordScorer,
) -> Result<FileBatchOutcome> {
    let target_column = target_column.trim();
    if target_column.is_empty() {
        return Err(Error::Validation("target column name is empty".to_string()));
    }

    let filename = sanitize_filename(&upload.filename);
    let format = FileFormat::from_filename(&filename)?;

    let upload_path = scratch.join(&filename);
    tokio::fs::write(&upload_path, &upload.bytes).await?;

    let parsed = parse_upload(upload_path.clone(), format).await;
    remove_upload(&upload_path).await;
    let mut table = parsed?;

    if table.is_empty() {
        return Ok(FileBatchOutcome::NothingToPredict);
    }
    require_canonical_columns(&table)?;

    let mut predictions = Vec::with_capacity(table.len());
    for idx in 0..table.len() {
        let record = normalize(&table.record(idx));
        match scorer.score(&record).await.into_result() {
            Ok(prediction) => predictions.push(Cell::Text(prediction)),
            Err(e) => {
                tracing::info!(row = idx, "Scoring failed, discarding batch");
                return Err(e);
            }
        }
    }

    let rows = table.len();
    table.set_column(target_column, predictions)?;

    let output_name = format!("prediction_{}", filename);
    let output_path = scratch.join(&output_name);
    let write_path = output_path.clone();
    tokio::task::spawn_blocking(move || write_table(&write_path, format, &table))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))??;

    Ok(FileBatchOutcome::Written(FileArtifact {
        filename: output_name,
        format,
        path: output_path,
        rows,
    }))
}

async fn parse_upload(path: PathBuf, format: FileFormat) -> Result<Table> {
    let mut table = tokio::task::spawn_blocking(move || read_table(&path, format))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))??;
    table.normalize_column_names();
    Ok(table)
}

async fn remove_upload(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), "Failed to delete upload: {}", e);
    }
}
