//! POST /api/db-predict: fill the NULL target column of a SQL table

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::{
    db::{BatchTarget, ConnectionParams, Dialect},
    error::ApiResult,
    pipeline::{run_database_batch, DbBatchOutcome, DbBatchRequest},
    AppState,
};

/// POST /api/db-predict request
///
/// Field aliases match the names used by the HTML form.
#[derive(Clone, Deserialize)]
pub struct DbPredictRequest {
    #[serde(alias = "db_name")]
    pub dialect: String,
    #[serde(alias = "server", default)]
    pub host: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<u16>,
    #[serde(alias = "tbl")]
    pub table: String,
    #[serde(alias = "id_col")]
    pub id_column: String,
    #[serde(alias = "target_col")]
    pub target_column: String,
}

impl fmt::Debug for DbPredictRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbPredictRequest")
            .field("dialect", &self.dialect)
            .field("host", &self.host)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("table", &self.table)
            .field("id_column", &self.id_column)
            .field("target_column", &self.target_column)
            .finish()
    }
}

impl DbPredictRequest {
    pub fn into_batch_request(self) -> predictor_common::Result<DbBatchRequest> {
        let target = BatchTarget::new(self.table, self.id_column, self.target_column)?;
        Ok(DbBatchRequest {
            dialect: Dialect::from_name(&self.dialect),
            connection: ConnectionParams {
                host: self.host,
                database: self.database,
                username: self.username,
                password: self.password,
                port: self.port,
            },
            target,
        })
    }
}

/// Form posts send the port as text; JSON clients send a number
fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Option::<Port>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Port::Number(port)) => Ok(Some(port)),
        Some(Port::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Port::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {}", text))),
    }
}

#[derive(Debug, Serialize)]
pub struct DbPredictResponse {
    pub success: bool,
    pub result: String,
    pub updated: usize,
}

/// POST /api/db-predict
pub async fn db_predict(
    State(state): State<AppState>,
    Json(request): Json<DbPredictRequest>,
) -> ApiResult<Json<DbPredictResponse>> {
    tracing::debug!(?request, "Database prediction requested");

    let batch = match request.into_batch_request() {
        Ok(batch) => batch,
        Err(e) => return Err(state.reject(e).await),
    };

    match run_database_batch(&batch, state.scorer.as_ref(), &state.collector).await {
        Ok(DbBatchOutcome::Completed { updated }) => Ok(Json(DbPredictResponse {
            success: true,
            result: "Success".to_string(),
            updated,
        })),
        Ok(DbBatchOutcome::NothingToPredict) => Ok(Json(DbPredictResponse {
            success: true,
            result: format!("{} has nothing to predict", batch.target.target_column()),
            updated: 0,
        })),
        Err(e) => Err(state.record_failure(e).await),
    }
}

pub fn db_predict_routes() -> Router<AppState> {
    Router::new().route("/api/db-predict", post(db_predict))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_aliases_and_text_port() {
        let request: DbPredictRequest = serde_json::from_value(json!({
            "db_name": "postgres",
            "server": "db.internal",
            "database": "census",
            "username": "analyst",
            "password": "secret",
            "port": "5432",
            "tbl": "adult",
            "id_col": "id",
            "target_col": "income"
        }))
        .unwrap();

        assert_eq!(request.port, Some(5432));
        let batch = request.into_batch_request().unwrap();
        assert_eq!(batch.dialect, Dialect::Postgres);
        assert_eq!(batch.connection.host, "db.internal");
        assert_eq!(batch.target.table(), "adult");
    }

    #[test]
    fn test_numeric_and_blank_port() {
        let numeric: DbPredictRequest = serde_json::from_value(json!({
            "dialect": "mysql", "host": "h", "port": 3306,
            "table": "t", "id_column": "id", "target_column": "income"
        }))
        .unwrap();
        assert_eq!(numeric.port, Some(3306));

        let blank: DbPredictRequest = serde_json::from_value(json!({
            "dialect": "sqlite", "database": "/tmp/x.db", "port": "",
            "table": "t", "id_column": "id", "target_column": "income"
        }))
        .unwrap();
        assert_eq!(blank.port, None);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let result: Result<DbPredictRequest, _> = serde_json::from_value(json!({
            "dialect": "mysql", "port": "port",
            "table": "t", "id_column": "id", "target_column": "income"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let request: DbPredictRequest = serde_json::from_value(json!({
            "dialect": "mysql", "password": "hunter2",
            "table": "t", "id_column": "id", "target_column": "income"
        }))
        .unwrap();
        assert!(!format!("{:?}", request).contains("hunter2"));
    }
}
