//! # Predictor Common Library
//!
//! Shared code for the census income predictor front-end:
//! - Canonical record schema and normalization
//! - Tabular cell/table types shared by the database and file flows
//! - Error taxonomy (validation, ingestion, scoring, I/O)
//! - Log collector client
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod record;
pub mod table;

pub use error::{Error, FailureKind, Result};
pub use logging::{CollectorHandle, LogLevel};
pub use record::{normalize, CanonicalRecord, FieldKind, RawRecord, CANONICAL_FIELDS};
pub use table::{Cell, Table};
