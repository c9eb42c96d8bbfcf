//! Test Helper Utilities
//!
//! Scorer doubles, a mock scoring server, and SQLite/CSV fixtures shared by the
//! predictor-web integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{http::StatusCode, routing::post, Json, Router};
use predictor_common::logging::MemoryCollector;
use predictor_common::{CanonicalRecord, Cell, CollectorHandle};
use predictor_web::db::{BatchTarget, ConnectionParams, Dialect};
use predictor_web::pipeline::DbBatchRequest;
use predictor_web::scorer::{PredictionOutcome, RecordScorer};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Header row used by the file fixtures (hyphenated like the census data set)
pub const CSV_HEADER: &str = "age,workclass,fnlwgt,education,education-num,marital-status,\
occupation,relationship,race,sex,capital-gain,capital-loss,hours-per-week,country";

/// Prediction the doubles return: `>50K` from age 40 on
pub fn expected_prediction(age: i64) -> &'static str {
    if age >= 40 {
        ">50K"
    } else {
        "<=50K"
    }
}

/// In-process scorer that optionally fails on its k-th call (1-based)
pub struct StubScorer {
    fail_on: Option<usize>,
    calls: AtomicUsize,
    seen: Mutex<Vec<CanonicalRecord>>,
}

impl StubScorer {
    pub fn succeeding() -> Self {
        Self {
            fail_on: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on: Some(call),
            ..Self::succeeding()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<CanonicalRecord> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordScorer for StubScorer {
    async fn score(&self, record: &CanonicalRecord) -> PredictionOutcome {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen.lock().unwrap().push(record.clone());

        if self.fail_on == Some(call) {
            return PredictionOutcome::Failed {
                status: Some(422),
                detail: r#"{"detail":"invalid record"}"#.to_string(),
            };
        }

        let age = match record.get("age") {
            Some(Cell::Integer(age)) => *age,
            _ => -1,
        };
        PredictionOutcome::Scored {
            status: 200,
            prediction: expected_prediction(age).to_string(),
        }
    }
}

/// Collector keeping entries in memory, plus a handle for the pipelines
pub fn memory_collector() -> (Arc<MemoryCollector>, CollectorHandle) {
    let memory = Arc::new(MemoryCollector::new());
    let handle = CollectorHandle::from_arc(memory.clone());
    (memory, handle)
}

/// Start a mock scoring API on an ephemeral port
///
/// Records with `age == -1` are rejected with 422; everything else is scored
/// like [`StubScorer`]. Returns the endpoint URL.
pub async fn spawn_mock_scoring_api() -> String {
    async fn predict(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        match body.get("age").and_then(Value::as_i64) {
            Some(-1) | None => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"detail": "age is required"})),
            ),
            Some(age) => (
                StatusCode::OK,
                Json(json!({"result": expected_prediction(age)})),
            ),
        }
    }

    let app = Router::new().route("/predict", post(predict));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/predict", addr)
}

/// One census row as CSV text (hyphenated header order)
pub fn csv_row(age: i64) -> String {
    format!(
        "{},Private,77516,Bachelors,13,Never-married,Adm-clerical,Not-in-family,White,Male,2174,0,40,United-States",
        age
    )
}

/// CSV document with one row per age
pub fn csv_document(ages: &[i64]) -> String {
    let mut doc = String::from(CSV_HEADER);
    doc.push('\n');
    for age in ages {
        doc.push_str(&csv_row(*age));
        doc.push('\n');
    }
    doc
}

/// Multipart body with a `fileinput` file and a `target_col` field
pub fn multipart_body(boundary: &str, filename: &str, content: &[u8], target: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"target_col\"\r\n\r\n{t}\r\n",
            b = boundary,
            t = target
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"fileinput\"; filename=\"{f}\"\r\n\
Content-Type: application/octet-stream\r\n\r\n",
            b = boundary,
            f = filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

/// SQLite database holding an `adult` table (ids deliberately not a key)
///
/// Returns (TempDir, pool, db path). TempDir must be kept alive for the test.
pub async fn create_census_db() -> (TempDir, SqlitePool, String) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("census.db");
    let db_path = db_path.to_string_lossy().to_string();

    let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await
        .unwrap();

    sqlx::query(
        r#"
        CREATE TABLE adult (
            id INTEGER,
            age INTEGER,
            workclass TEXT,
            fnlwgt INTEGER,
            education TEXT,
            education_num INTEGER,
            marital_status TEXT,
            occupation TEXT,
            relationship TEXT,
            race TEXT,
            sex TEXT,
            capital_gain INTEGER,
            capital_loss INTEGER,
            hours_per_week INTEGER,
            country TEXT,
            income TEXT
        )
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    (temp_dir, pool, db_path)
}

/// Insert one row; `age: None` stores NULL
pub async fn insert_person(pool: &SqlitePool, id: i64, age: Option<i64>, income: Option<&str>) {
    sqlx::query(
        r#"
        INSERT INTO adult (id, age, workclass, fnlwgt, education, education_num,
            marital_status, occupation, relationship, race, sex, capital_gain,
            capital_loss, hours_per_week, country, income)
        VALUES (?, ?, 'Private', 77516, 'Bachelors', 13, 'Never-married', 'Adm-clerical',
            'Not-in-family', 'White', 'Male', 2174, 0, 40, 'United-States', ?)
        "#,
    )
    .bind(id)
    .bind(age)
    .bind(income)
    .execute(pool)
    .await
    .unwrap();
}

/// Income column by id, in id order
pub async fn incomes(pool: &SqlitePool) -> Vec<(i64, Option<String>)> {
    sqlx::query_as::<_, (i64, Option<String>)>("SELECT id, income FROM adult ORDER BY id")
        .fetch_all(pool)
        .await
        .unwrap()
}

/// Batch request against the fixture database
pub fn sqlite_batch(db_path: &str) -> DbBatchRequest {
    DbBatchRequest {
        dialect: Dialect::Sqlite,
        connection: ConnectionParams {
            database: db_path.to_string(),
            ..Default::default()
        },
        target: BatchTarget::new("adult", "id", "income").unwrap(),
    }
}

/// Add date, boolean and blob columns to the fixture and fill every row
pub async fn add_record_keeping_columns(pool: &SqlitePool) {
    for statement in [
        "ALTER TABLE adult ADD COLUMN recorded_at DATETIME",
        "ALTER TABLE adult ADD COLUMN verified BOOLEAN",
        "ALTER TABLE adult ADD COLUMN born DATE",
        "ALTER TABLE adult ADD COLUMN wage NUMERIC",
        "ALTER TABLE adult ADD COLUMN scan BLOB",
        "UPDATE adult SET recorded_at = '2024-01-15 10:30:00', verified = 1, \
         born = '1985-03-02', wage = 21.75, scan = X'FF00'",
    ] {
        sqlx::query(statement).execute(pool).await.unwrap();
    }
}

/// Make every UPDATE of the row with `id` abort
pub async fn fail_updates_of(pool: &SqlitePool, id: i64) {
    sqlx::query(&format!(
        "CREATE TRIGGER reject_update BEFORE UPDATE ON adult WHEN OLD.id = {} \
         BEGIN SELECT RAISE(ABORT, 'row is locked'); END",
        id
    ))
    .execute(pool)
    .await
    .unwrap();
}
