//! Common error types for the predictor front-end

use serde::Serialize;
use thiserror::Error;

/// Common result type for predictor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure classification reported to callers alongside the error detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Ingestion,
    Scoring,
    Io,
    Config,
}

/// Errors raised by the prediction pipelines
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected input (duplicate identifiers, unsafe identifiers, bad upload)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Connection or query failure while reading a batch
    #[error("Ingestion error ({dialect}): {cause}")]
    Ingestion { dialect: String, cause: String },

    /// Database operation error during write-back (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Non-200 answer or transport failure from the scoring endpoint
    #[error("Scoring error: {detail}")]
    Scoring { status: Option<u16>, detail: String },

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV or spreadsheet could not be read or written
    #[error("File format error: {0}")]
    FileFormat(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Classify this error into the caller-facing failure kind
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Validation(_) => FailureKind::Validation,
            Error::Ingestion { .. } => FailureKind::Ingestion,
            #[cfg(feature = "sqlx")]
            Error::Database(_) => FailureKind::Ingestion,
            Error::Scoring { .. } => FailureKind::Scoring,
            Error::Io(_) | Error::FileFormat(_) => FailureKind::Io,
            Error::Config(_) => FailureKind::Config,
        }
    }

    /// HTTP status returned by the scoring endpoint, if the error came from one
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Error::Scoring { status, .. } => *status,
            _ => None,
        }
    }
}
