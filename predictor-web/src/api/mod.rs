//! HTTP API handlers for predictor-web

pub mod db_predict;
pub mod file_predict;
pub mod health;
pub mod predict;

pub use health::health_routes;

use axum::Router;

use crate::AppState;

/// All prediction endpoints under `/api`
pub fn prediction_routes() -> Router<AppState> {
    Router::new()
        .merge(predict::predict_routes())
        .merge(db_predict::db_predict_routes())
        .merge(file_predict::file_predict_routes())
}
