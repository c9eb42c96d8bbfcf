//! Database flow: predict every row whose target column is NULL
//!
//! All updates of one batch run in a single transaction. The first scoring or
//! update failure rolls the whole batch back, so a batch is either fully
//! written or not written at all.

use predictor_common::record::MISSING_NUMERIC;
use predictor_common::{normalize, Cell, CollectorHandle, Error, Result, Table};
use sqlx::any::{Any, AnyArguments};
use sqlx::query::Query;
use sqlx::{AnyConnection, Connection, Transaction};
use std::collections::HashSet;
use tracing::Instrument;
use uuid::Uuid;

use super::require_canonical_columns;
use crate::db::{self, ingestion_error, BatchTarget, ConnectionParams, Dialect};
use crate::scorer::RecordScorer;

/// Everything needed to run one database batch
#[derive(Debug, Clone)]
pub struct DbBatchRequest {
    pub dialect: Dialect,
    pub connection: ConnectionParams,
    pub target: BatchTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbBatchOutcome {
    /// No row has a NULL target; nothing was opened or written
    NothingToPredict,
    /// Every row was scored and written in one committed transaction
    Completed { updated: usize },
}

pub async fn run_database_batch(
    request: &DbBatchRequest,
    scorer: &dyn RecordScorer,
    collector: &CollectorHandle,
) -> Result<DbBatchOutcome> {
    let batch_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "db_batch",
        %batch_id,
        dialect = %request.dialect,
        table = request.target.table()
    );

    async move {
        collector.info("entering db_prediction");

        let result = execute(request, scorer, collector).await;
        match &result {
            Ok(DbBatchOutcome::Completed { updated }) => {
                collector.info(format!("db_prediction committed {} rows", updated))
            }
            Ok(DbBatchOutcome::NothingToPredict) => collector.info(format!(
                "{} has nothing to predict",
                request.target.target_column()
            )),
            Err(e) => collector.critical(e.to_string()),
        }

        collector.info("exiting db_prediction");
        result
    }
    .instrument(span)
    .await
}

async fn execute(
    request: &DbBatchRequest,
    scorer: &dyn RecordScorer,
    collector: &CollectorHandle,
) -> Result<DbBatchOutcome> {
    let dialect = request.dialect;
    let query = request
        .target
        .select_missing_sql(dialect, &request.connection);

    let table = db::ingest(dialect, &query, &request.connection, collector).await?;
    if table.is_empty() {
        return Ok(DbBatchOutcome::NothingToPredict);
    }

    require_canonical_columns(&table)?;
    let ids = batch_ids(&table, request.target.id_column())?;

    let mut conn = db::connect(dialect, &request.connection).await?;
    let result = update_rows(&mut conn, request, &table, &ids, scorer).await;

    if let Err(e) = conn.close().await {
        tracing::warn!("Failed to close batch connection: {}", e);
    }

    result.map(|updated| DbBatchOutcome::Completed { updated })
}

/// Identifier of every row, in ingestion order
///
/// The column must exist and hold unique, non-null values.
fn batch_ids(table: &Table, id_column: &str) -> Result<Vec<Cell>> {
    let column = table.column(id_column).ok_or_else(|| {
        Error::Validation(format!("identifier column {} not found", id_column))
    })?;

    let mut seen = HashSet::with_capacity(column.len());
    for id in &column {
        if id.is_null() {
            return Err(Error::Validation(format!("{} has null values", id_column)));
        }
        if !seen.insert(id.to_string()) {
            return Err(Error::Validation(format!(
                "{} has duplicate values",
                id_column
            )));
        }
    }

    Ok(column.into_iter().cloned().collect())
}

async fn update_rows(
    conn: &mut AnyConnection,
    request: &DbBatchRequest,
    table: &Table,
    ids: &[Cell],
    scorer: &dyn RecordScorer,
) -> Result<usize> {
    let dialect = request.dialect;
    let update_sql = request.target.update_sql(dialect, &request.connection);

    let mut tx = conn
        .begin()
        .await
        .map_err(|e| ingestion_error(dialect, e))?;

    for (idx, id) in ids.iter().enumerate() {
        let raw = table.record(idx).with_nulls_as(Cell::Integer(MISSING_NUMERIC));
        let record = normalize(&raw);

        let prediction = match scorer.score(&record).await.into_result() {
            Ok(prediction) => prediction,
            Err(e) => {
                tracing::info!(row = idx, id = %id, "Scoring failed, rolling back batch");
                rollback(tx).await;
                return Err(e);
            }
        };

        let update = bind_cell(sqlx::query(&update_sql).bind(prediction), id);
        if let Err(e) = update.execute(&mut *tx).await {
            rollback(tx).await;
            return Err(Error::Database(e));
        }
    }

    tx.commit().await?;

    Ok(ids.len())
}

async fn rollback(tx: Transaction<'_, Any>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!("Rollback failed: {}", e);
    }
}

/// Bind an identifier with the type it was ingested as
fn bind_cell<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    cell: &Cell,
) -> Query<'q, Any, AnyArguments<'q>> {
    match cell {
        Cell::Integer(i) => query.bind(*i),
        Cell::Float(f) => query.bind(*f),
        Cell::Bool(b) => query.bind(*b),
        Cell::Text(s) => query.bind(s.clone()),
        Cell::Null => query.bind(None::<String>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_ids(ids: Vec<Cell>) -> Table {
        let mut table = Table::new(vec!["id".into(), "age".into()]);
        for id in ids {
            table.push_row(vec![id, Cell::Integer(30)]).unwrap();
        }
        table
    }

    #[test]
    fn test_batch_ids_in_order() {
        let table = table_with_ids(vec![Cell::Integer(3), Cell::Integer(1), Cell::Integer(2)]);
        assert_eq!(
            batch_ids(&table, "id").unwrap(),
            vec![Cell::Integer(3), Cell::Integer(1), Cell::Integer(2)]
        );
    }

    #[test]
    fn test_batch_ids_rejects_duplicates() {
        let table = table_with_ids(vec![Cell::Integer(1), Cell::Integer(2), Cell::Integer(1)]);
        match batch_ids(&table, "id") {
            Err(Error::Validation(msg)) => assert_eq!(msg, "id has duplicate values"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_batch_ids_rejects_nulls() {
        let table = table_with_ids(vec![Cell::Integer(1), Cell::Null]);
        assert!(matches!(
            batch_ids(&table, "id"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_batch_ids_missing_column() {
        let table = table_with_ids(vec![Cell::Integer(1)]);
        assert!(matches!(
            batch_ids(&table, "row_id"),
            Err(Error::Validation(_))
        ));
    }
}
