//! Single-record flow: normalize, score, return

use predictor_common::{normalize, CollectorHandle, RawRecord, Result};

use crate::scorer::RecordScorer;

pub async fn run_single(
    raw: &RawRecord,
    scorer: &dyn RecordScorer,
    collector: &CollectorHandle,
) -> Result<String> {
    collector.info("entering single_prediction");

    let record = normalize(raw);
    let result = scorer.score(&record).await.into_result();

    match &result {
        Ok(prediction) => collector.info(format!("prediction: {}", prediction)),
        Err(e) => collector.critical(e.to_string()),
    }
    collector.info("exiting single_prediction");

    result
}
