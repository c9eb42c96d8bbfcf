//! Run a query and materialize the result set as a [`Table`]
//!
//! Each dialect is read through its native driver and every value is decoded
//! by the type the server reports for it. Numbers and booleans keep their
//! type; dates, times, UUIDs and JSON become text; binary values become
//! lossily decoded text. A value that cannot be decoded fails the ingestion.

use predictor_common::{Cell, CollectorHandle, Result, Table};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, Row, TypeInfo, ValueRef};

use super::{connection_url, ingestion_error, ConnectionParams, Dialect};

type Decoder<R> = fn(&R, usize) -> std::result::Result<Cell, sqlx::Error>;

/// Execute `query` against the server and return every row
///
/// The connection is opened for this call only and closed before returning.
/// A failure at any point is reported as an ingestion error naming the dialect.
pub async fn ingest(
    dialect: Dialect,
    query: &str,
    params: &ConnectionParams,
    collector: &CollectorHandle,
) -> Result<Table> {
    collector.info("entering data_ingestion");

    let result = fetch_table(dialect, query, params).await;

    match &result {
        Ok(table) => {
            collector.info(format!("data_ingestion returned {} rows", table.len()));
            collector.info("exiting data_ingestion");
        }
        Err(e) => collector.critical(format!("data_ingestion failed: {}", e)),
    }

    result
}

async fn fetch_table(dialect: Dialect, query: &str, params: &ConnectionParams) -> Result<Table> {
    let url = connection_url(dialect, params)?;
    let fail = |e: sqlx::Error| ingestion_error(dialect, e);

    match dialect {
        Dialect::Sqlite => {
            let mut conn = SqliteConnection::connect(&url).await.map_err(fail)?;
            let rows = sqlx::query(query).fetch_all(&mut conn).await;
            close(dialect, conn).await;
            rows_to_table(dialect, &rows.map_err(fail)?, decode_sqlite)
        }
        Dialect::Postgres => {
            let mut conn = PgConnection::connect(&url).await.map_err(fail)?;
            let rows = sqlx::query(query).fetch_all(&mut conn).await;
            close(dialect, conn).await;
            rows_to_table(dialect, &rows.map_err(fail)?, decode_postgres)
        }
        Dialect::MySql => {
            let mut conn = MySqlConnection::connect(&url).await.map_err(fail)?;
            let rows = sqlx::query(query).fetch_all(&mut conn).await;
            close(dialect, conn).await;
            rows_to_table(dialect, &rows.map_err(fail)?, decode_mysql)
        }
    }
}

async fn close<C: Connection>(dialect: Dialect, conn: C) {
    if let Err(e) = conn.close().await {
        tracing::warn!(dialect = %dialect, "Failed to close ingestion connection: {}", e);
    }
}

/// Column names come from the first row; an empty result has no columns
fn rows_to_table<R: Row>(dialect: Dialect, rows: &[R], decode: Decoder<R>) -> Result<Table> {
    let columns: Vec<String> = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect()
        })
        .unwrap_or_default();

    let mut table = Table::new(columns.clone());
    for row in rows {
        let mut cells = Vec::with_capacity(row.len());
        for i in 0..row.len() {
            let cell = decode(row, i).map_err(|e| {
                ingestion_error(dialect, format!("column {}: {}", columns[i], e))
            })?;
            cells.push(cell);
        }
        table.push_row(cells)?;
    }

    Ok(table)
}

/// SQLite values carry their storage class regardless of the declared type
fn decode_sqlite(row: &SqliteRow, i: usize) -> std::result::Result<Cell, sqlx::Error> {
    let raw = row.try_get_raw(i)?;
    if raw.is_null() {
        return Ok(Cell::Null);
    }

    match raw.type_info().name() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(i).map(Cell::Integer),
        "REAL" => row.try_get_unchecked::<f64, _>(i).map(Cell::Float),
        "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(i).map(lossy_text),
        _ => row.try_get_unchecked::<String, _>(i).map(Cell::Text),
    }
}

fn decode_postgres(row: &PgRow, i: usize) -> std::result::Result<Cell, sqlx::Error> {
    let raw = row.try_get_raw(i)?;
    if raw.is_null() {
        return Ok(Cell::Null);
    }

    match raw.type_info().name() {
        "BOOL" => row.try_get::<bool, _>(i).map(Cell::Bool),
        "INT2" => row.try_get::<i16, _>(i).map(|v| Cell::Integer(v.into())),
        "INT4" => row.try_get::<i32, _>(i).map(|v| Cell::Integer(v.into())),
        "INT8" => row.try_get::<i64, _>(i).map(Cell::Integer),
        "OID" => row
            .try_get::<sqlx::postgres::types::Oid, _>(i)
            .map(|v| Cell::Integer(v.0.into())),
        "FLOAT4" => row.try_get::<f32, _>(i).map(|v| Cell::Float(v.into())),
        "FLOAT8" => row.try_get::<f64, _>(i).map(Cell::Float),
        "NUMERIC" => row.try_get::<Decimal, _>(i).map(decimal_cell),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(i)
            .map(|v| Cell::Text(v.to_string())),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(i)
            .map(|v| Cell::Text(v.to_string())),
        "TIMESTAMP" => row.try_get::<chrono::NaiveDateTime, _>(i).map(datetime_text),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(i)
            .map(|v| Cell::Text(v.to_rfc3339())),
        "UUID" => row
            .try_get::<uuid::Uuid, _>(i)
            .map(|v| Cell::Text(v.to_string())),
        "JSON" | "JSONB" => row
            .try_get::<serde_json::Value, _>(i)
            .map(|v| Cell::Text(v.to_string())),
        "BYTEA" => row.try_get::<Vec<u8>, _>(i).map(lossy_text),
        // Text-like types, enums and domains
        _ => row.try_get_unchecked::<String, _>(i).map(Cell::Text),
    }
}

fn decode_mysql(row: &MySqlRow, i: usize) -> std::result::Result<Cell, sqlx::Error> {
    let raw = row.try_get_raw(i)?;
    if raw.is_null() {
        return Ok(Cell::Null);
    }

    match raw.type_info().name() {
        "BOOLEAN" => row.try_get_unchecked::<bool, _>(i).map(Cell::Bool),
        name if name.ends_with(" UNSIGNED") => {
            row.try_get_unchecked::<u64, _>(i).map(|v| match i64::try_from(v) {
                Ok(v) => Cell::Integer(v),
                Err(_) => Cell::Text(v.to_string()),
            })
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            row.try_get_unchecked::<i64, _>(i).map(Cell::Integer)
        }
        "FLOAT" => row.try_get_unchecked::<f32, _>(i).map(|v| Cell::Float(v.into())),
        "DOUBLE" => row.try_get_unchecked::<f64, _>(i).map(Cell::Float),
        "DECIMAL" => row.try_get_unchecked::<Decimal, _>(i).map(decimal_cell),
        "DATE" => row
            .try_get_unchecked::<chrono::NaiveDate, _>(i)
            .map(|v| Cell::Text(v.to_string())),
        "TIME" => row
            .try_get_unchecked::<chrono::NaiveTime, _>(i)
            .map(|v| Cell::Text(v.to_string())),
        "DATETIME" | "TIMESTAMP" => row
            .try_get_unchecked::<chrono::NaiveDateTime, _>(i)
            .map(datetime_text),
        "JSON" => row
            .try_get_unchecked::<serde_json::Value, _>(i)
            .map(|v| Cell::Text(v.to_string())),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => row.try_get_unchecked::<Vec<u8>, _>(i).map(lossy_text),
        _ => row.try_get_unchecked::<String, _>(i).map(Cell::Text),
    }
}

/// Whole decimals that fit become integers; the rest become floats
fn decimal_cell(value: Decimal) -> Cell {
    if value.fract().is_zero() {
        if let Some(i) = value.to_i64() {
            return Cell::Integer(i);
        }
    }

    match value.to_f64() {
        Some(f) => Cell::Float(f),
        None => Cell::Text(value.to_string()),
    }
}

fn datetime_text(value: chrono::NaiveDateTime) -> Cell {
    Cell::Text(value.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

fn lossy_text(bytes: Vec<u8>) -> Cell {
    Cell::Text(String::from_utf8_lossy(&bytes).into_owned())
}
