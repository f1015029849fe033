//! Chunk repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use kasten_core::{new_v7, Chunk, ChunkRepository, Error, Result};

/// PostgreSQL implementation of ChunkRepository.
#[derive(Clone)]
pub struct PgChunkRepository {
    pool: Pool<Postgres>,
}

impl PgChunkRepository {
    /// Create a new PgChunkRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Chunk {
        Chunk {
            id: row.get("id"),
            content_id: row.get("content_id"),
            seq: row.get("seq"),
            text: row.get("text"),
            char_count: row.get("char_count"),
            embedding: row.get("embedding"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl ChunkRepository for PgChunkRepository {
    async fn replace_for_content(&self, content_id: Uuid, texts: Vec<String>) -> Result<Vec<Uuid>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("DELETE FROM chunks WHERE content_id = $1")
            .bind(content_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let now = Utc::now();
        let mut ids = Vec::with_capacity(texts.len());
        for (seq, text) in texts.iter().enumerate() {
            let id = new_v7();
            sqlx::query(
                "INSERT INTO chunks (id, content_id, seq, text, char_count, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(id)
            .bind(content_id)
            .bind(seq as i32)
            .bind(text)
            .bind(text.chars().count() as i32)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
            ids.push(id);
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(ids)
    }

    async fn get_for_content(&self, content_id: Uuid) -> Result<Vec<Chunk>> {
        let rows = sqlx::query("SELECT * FROM chunks WHERE content_id = $1 ORDER BY seq")
            .bind(content_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn fetch_texts(&self, ids: &[Uuid]) -> Result<Vec<(Uuid, String)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query("SELECT id, text FROM chunks WHERE id = ANY($1) ORDER BY seq")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("id"), r.get("text")))
            .collect())
    }

    async fn store_embeddings(&self, embeddings: Vec<(Uuid, Vector)>) -> Result<usize> {
        let mut updated = 0usize;
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        for (id, vector) in embeddings {
            let result = sqlx::query("UPDATE chunks SET embedding = $1 WHERE id = $2")
                .bind(vector)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
            updated += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(updated)
    }

    async fn ids_missing_embedding(&self, content_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT id FROM chunks WHERE content_id = $1 AND embedding IS NULL ORDER BY seq",
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(|r| r.get("id")).collect())
    }
}
