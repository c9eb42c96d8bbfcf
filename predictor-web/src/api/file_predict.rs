//! POST /api/file-predict: score an uploaded CSV/XLSX file
//!
//! Multipart fields: `fileinput` (the file) and `target_col` (name of the
//! prediction column). On success the response is the prediction file itself.

use axum::{
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use predictor_common::{Error, Result};
use serde_json::json;
use tempfile::TempDir;

use crate::{
    error::ApiResult,
    pipeline::{run_file_batch, FileArtifact, FileBatchOutcome, FileUpload},
    AppState,
};

/// POST /api/file-predict
pub async fn file_predict(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let (upload, target_column) = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => return Err(state.reject(e).await),
    };

    // Removed with everything in it when this handler returns
    let scratch = match TempDir::new() {
        Ok(scratch) => scratch,
        Err(e) => return Err(state.reject(e.into()).await),
    };

    let outcome = run_file_batch(
        scratch.path(),
        upload,
        &target_column,
        state.scorer.as_ref(),
        &state.collector,
    )
    .await;

    match outcome {
        Ok(FileBatchOutcome::Written(artifact)) => match attachment(&artifact).await {
            Ok(response) => Ok(response),
            Err(e) => Err(state.reject(e).await),
        },
        Ok(FileBatchOutcome::NothingToPredict) => Ok(Json(json!({
            "success": true,
            "result": "Nothing to predict",
        }))
        .into_response()),
        Err(e) => Err(state.record_failure(e).await),
    }
}

/// Collect the `fileinput` and `target_col` fields
async fn read_form(mut multipart: Multipart) -> Result<(FileUpload, String)> {
    let mut upload = None;
    let mut target_column = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("fileinput") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| Error::Validation(format!("failed to read upload: {}", e)))?;
                upload = Some(FileUpload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            Some("target_col") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| Error::Validation(format!("failed to read target_col: {}", e)))?;
                target_column = Some(text);
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| Error::Validation("missing fileinput field".into()))?;
    let target_column =
        target_column.ok_or_else(|| Error::Validation("missing target_col field".into()))?;

    Ok((upload, target_column))
}

async fn attachment(artifact: &FileArtifact) -> Result<Response> {
    let bytes = tokio::fs::read(&artifact.path).await?;
    let disposition = format!("attachment; filename=\"{}\"", artifact.filename);

    Ok((
        [
            (header::CONTENT_TYPE, artifact.format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

pub fn file_predict_routes() -> Router<AppState> {
    Router::new().route("/api/file-predict", post(file_predict))
}
