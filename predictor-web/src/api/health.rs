//! GET /health: liveness plus what this instance is wired to

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// Commit the binary was built from, `-dirty` when the tree had changes
    pub build: String,
    pub uptime_seconds: u64,
    /// Prediction API every flow sends records to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring_endpoint: Option<String>,
    /// Most recent failed request, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        module: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: env!("GIT_HASH").to_string(),
        uptime_seconds,
        scoring_endpoint: state.scorer.endpoint_url().map(str::to_string),
        last_error: state.last_error.read().await.clone(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
