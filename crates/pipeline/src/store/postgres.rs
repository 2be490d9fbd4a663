//! Postgres-backed store.
//!
//! Documents are stored as JSONB under their canonical timestamp key; the
//! key's lexicographic order equals chronological order, so `ORDER BY
//! timestamp_key` gives the scan orders the contract requires.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE measurements (timestamp_key TEXT PRIMARY KEY, doc JSONB NOT NULL);
//! CREATE TABLE predictions  (timestamp_key TEXT PRIMARY KEY, doc JSONB NOT NULL);
//! ```

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use airsense_core::{CanonicalReading, PipelineError, PipelineResult, Prediction};

use super::MeasurementStore;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert_doc(
        &self,
        table: &str,
        key: String,
        doc: serde_json::Value,
    ) -> PipelineResult<()> {
        let sql = format!(
            "INSERT INTO {table} (timestamp_key, doc) VALUES ($1, $2) \
             ON CONFLICT (timestamp_key) DO UPDATE SET doc = EXCLUDED.doc"
        );
        sqlx::query(&sql)
            .bind(key)
            .bind(doc)
            .execute(&self.pool)
            .await
            .map_err(|e| PipelineError::store(format!("{table} upsert failed: {e}")))?;
        Ok(())
    }

    async fn fetch_docs(&self, sql: &str, n: Option<i64>) -> PipelineResult<Vec<serde_json::Value>> {
        let query = match n {
            Some(n) => sqlx::query(sql).bind(n),
            None => sqlx::query(sql),
        };
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PipelineError::store(format!("query failed: {e}")))?;

        rows.iter()
            .map(|row| {
                row.try_get::<serde_json::Value, _>("doc")
                    .map_err(|e| PipelineError::store(format!("bad row: {e}")))
            })
            .collect()
    }
}

fn decode<T: serde::de::DeserializeOwned>(docs: Vec<serde_json::Value>) -> PipelineResult<Vec<T>> {
    docs.into_iter()
        .map(|doc| {
            serde_json::from_value(doc).map_err(|e| PipelineError::store(format!("bad document: {e}")))
        })
        .collect()
}

#[async_trait]
impl MeasurementStore for PostgresStore {
    async fn upsert_reading(&self, reading: &CanonicalReading) -> PipelineResult<()> {
        let doc = serde_json::to_value(reading)
            .map_err(|e| PipelineError::store(format!("serialize reading: {e}")))?;
        self.upsert_doc("measurements", reading.key(), doc).await
    }

    async fn upsert_prediction(&self, prediction: &Prediction) -> PipelineResult<()> {
        let doc = serde_json::to_value(prediction)
            .map_err(|e| PipelineError::store(format!("serialize prediction: {e}")))?;
        self.upsert_doc("predictions", prediction.key(), doc).await
    }

    async fn all_readings(&self) -> PipelineResult<Vec<CanonicalReading>> {
        let docs = self
            .fetch_docs("SELECT doc FROM measurements ORDER BY timestamp_key ASC", None)
            .await?;
        decode(docs)
    }

    async fn recent_readings(&self, n: usize) -> PipelineResult<Vec<CanonicalReading>> {
        let docs = self
            .fetch_docs(
                "SELECT doc FROM measurements ORDER BY timestamp_key DESC LIMIT $1",
                Some(n as i64),
            )
            .await?;
        decode(docs)
    }

    async fn recent_predictions(&self, n: usize) -> PipelineResult<Vec<Prediction>> {
        let docs = self
            .fetch_docs(
                "SELECT doc FROM predictions ORDER BY timestamp_key DESC LIMIT $1",
                Some(n as i64),
            )
            .await?;
        decode(docs)
    }

    async fn reading_count(&self) -> PipelineResult<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM measurements")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PipelineError::store(format!("count failed: {e}")))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| PipelineError::store(format!("bad count row: {e}")))?;
        Ok(n as usize)
    }
}
