//! Append-only signal (audit) repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use kasten_core::{new_v7, Error, Result, Signal, SignalRepository, SignalType};

/// PostgreSQL implementation of SignalRepository. There are deliberately
/// no update or delete operations.
#[derive(Clone)]
pub struct PgSignalRepository {
    pool: Pool<Postgres>,
}

impl PgSignalRepository {
    /// Create a new PgSignalRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignalRepository for PgSignalRepository {
    async fn record(
        &self,
        content_id: Uuid,
        signal_type: SignalType,
        payload: JsonValue,
        confidence: Option<f32>,
        model_version: Option<&str>,
    ) -> Result<Uuid> {
        let id = new_v7();
        sqlx::query(
            "INSERT INTO signals
                 (id, content_id, signal_type, payload, confidence, model_version, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(content_id)
        .bind(signal_type.as_str())
        .bind(payload)
        .bind(confidence)
        .bind(model_version)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn list_for_content(&self, content_id: Uuid) -> Result<Vec<Signal>> {
        let rows = sqlx::query(
            "SELECT * FROM signals WHERE content_id = $1 ORDER BY created_at DESC",
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| Signal {
                id: row.get("id"),
                content_id: row.get("content_id"),
                signal_type: SignalType::parse(row.get("signal_type")),
                payload: row.get("payload"),
                confidence: row.get("confidence"),
                model_version: row.get("model_version"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
