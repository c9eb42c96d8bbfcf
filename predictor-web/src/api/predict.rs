//! POST /api/predict: score one submitted record

use axum::{extract::State, routing::post, Json, Router};
use predictor_common::RawRecord;
use serde::Serialize;

use crate::{error::ApiResult, pipeline::run_single, AppState};

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    /// Display text, e.g. `Prediction: >50K`
    pub result: String,
    pub prediction: String,
}

/// POST /api/predict
///
/// Accepts canonical field names as well as the short form names
/// (`nedu`, `marital`, `cgain`, `closs`, `nhours`).
pub async fn predict(
    State(state): State<AppState>,
    Json(raw): Json<RawRecord>,
) -> ApiResult<Json<PredictResponse>> {
    let raw = raw.with_form_aliases();

    match run_single(&raw, state.scorer.as_ref(), &state.collector).await {
        Ok(prediction) => Ok(Json(PredictResponse {
            success: true,
            result: format!("Prediction: {}", prediction),
            prediction,
        })),
        Err(e) => Err(state.record_failure(e).await),
    }
}

pub fn predict_routes() -> Router<AppState> {
    Router::new().route("/api/predict", post(predict))
}
