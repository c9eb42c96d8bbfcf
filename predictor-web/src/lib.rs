//! predictor-web library - census income prediction front-end
//!
//! Collects records from a JSON form, a SQL table, or an uploaded CSV/XLSX
//! file, scores each through the remote prediction API, and writes the
//! predictions back to their source.

pub mod api;
pub mod db;
pub mod error;
pub mod files;
pub mod pipeline;
pub mod scorer;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use predictor_common::CollectorHandle;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::scorer::RecordScorer;

/// Largest accepted request body (uploads included)
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Client for the remote scoring endpoint
    pub scorer: Arc<dyn RecordScorer>,
    /// Process-wide log collector
    pub collector: CollectorHandle,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last pipeline error, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(scorer: Arc<dyn RecordScorer>, collector: CollectorHandle) -> Self {
        Self {
            scorer,
            collector,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember a failed pipeline run and convert it for the response
    pub async fn record_failure(&self, err: predictor_common::Error) -> ApiError {
        *self.last_error.write().await = Some(err.to_string());
        ApiError::Pipeline(err)
    }

    /// Fail a request before any pipeline ran: log it CRITICAL, then record it
    pub async fn reject(&self, err: predictor_common::Error) -> ApiError {
        self.collector.critical(err.to_string());
        self.record_failure(err).await
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::prediction_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
