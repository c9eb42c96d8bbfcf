//! Remote scoring endpoint client
//!
//! One canonical record per call, strictly synchronous from the caller's point
//! of view: no retry, no timeout beyond the transport default.

use async_trait::async_trait;
use predictor_common::{CanonicalRecord, Error, Result};
use serde_json::Value;

const USER_AGENT: &str = concat!("predictor-web/", env!("CARGO_PKG_VERSION"));

/// Result of scoring one record
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    /// Endpoint answered 200 with a `result`
    Scored { status: u16, prediction: String },
    /// Non-200 answer (body verbatim) or transport failure (no status)
    Failed { status: Option<u16>, detail: String },
}

impl PredictionOutcome {
    /// Turn a failed outcome into [`Error::Scoring`]
    pub fn into_result(self) -> Result<String> {
        match self {
            PredictionOutcome::Scored { prediction, .. } => Ok(prediction),
            PredictionOutcome::Failed { status, detail } => Err(Error::Scoring { status, detail }),
        }
    }
}

/// Anything able to score a canonical record
#[async_trait]
pub trait RecordScorer: Send + Sync {
    async fn score(&self, record: &CanonicalRecord) -> PredictionOutcome;

    /// Remote endpoint records are sent to, when there is one
    fn endpoint_url(&self) -> Option<&str> {
        None
    }
}

/// HTTP client for the prediction API
pub struct HttpScorer {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpScorer {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl RecordScorer for HttpScorer {
    fn endpoint_url(&self) -> Option<&str> {
        Some(&self.endpoint)
    }

    async fn score(&self, record: &CanonicalRecord) -> PredictionOutcome {
        let response = match self
            .http_client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return PredictionOutcome::Failed {
                    status: None,
                    detail: format!("Network error: {}", e),
                }
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return PredictionOutcome::Failed {
                    status: Some(status),
                    detail: format!("Failed to read scoring response: {}", e),
                }
            }
        };

        if status != 200 {
            tracing::debug!(status, "Scoring endpoint rejected record");
            return PredictionOutcome::Failed {
                status: Some(status),
                detail: body,
            };
        }

        match extract_prediction(&body) {
            Some(prediction) => PredictionOutcome::Scored { status, prediction },
            None => PredictionOutcome::Failed {
                status: Some(status),
                detail: format!("Malformed scoring response: {}", body),
            },
        }
    }
}

/// Pull `result` out of a 200 body; non-string scalars are rendered as text
fn extract_prediction(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    match json.get("result")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
