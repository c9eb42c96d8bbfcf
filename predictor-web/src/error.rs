//! Error types for predictor-web
//!
//! Pipeline failures map onto HTTP status codes by [`FailureKind`]; the body
//! always carries the failure kind and the underlying detail.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use predictor_common::FailureKind;
use serde_json::{json, Value};
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was invalid or a pipeline stage failed
    #[error(transparent)]
    Pipeline(#[from] predictor_common::Error),
}

impl ApiError {
    fn kind(&self) -> FailureKind {
        match self {
            ApiError::Pipeline(err) => err.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, error_code) = match kind {
            FailureKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            FailureKind::Ingestion => (StatusCode::BAD_GATEWAY, "INGESTION_ERROR"),
            FailureKind::Scoring => (StatusCode::BAD_GATEWAY, "SCORING_ERROR"),
            FailureKind::Io => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            FailureKind::Config => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
        };

        let mut error = json!({
            "code": error_code,
            "kind": kind,
            "message": self.to_string(),
        });

        // Scoring failures surface the endpoint's body as-is (parsed when JSON)
        if let ApiError::Pipeline(predictor_common::Error::Scoring { status, detail }) = &self {
            error["upstream_status"] = json!(status);
            error["detail"] =
                serde_json::from_str(detail).unwrap_or_else(|_| Value::String(detail.clone()));
        }

        let body = Json(json!({
            "success": false,
            "error": error,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
