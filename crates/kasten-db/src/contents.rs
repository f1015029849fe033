//! Content repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use tracing::warn;
use uuid::Uuid;

use kasten_core::{
    new_v7, ClassificationStatus, Content, ContentRepository, CreateContentRequest, Error,
    Modality, ParsingStatus, ProcessingState, Result,
};

/// PostgreSQL implementation of ContentRepository.
#[derive(Clone)]
pub struct PgContentRepository {
    pool: Pool<Postgres>,
}

impl PgContentRepository {
    /// Create a new PgContentRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Content {
        Content {
            id: row.get("id"),
            title: row.get("title"),
            text: row.get("text"),
            modality: Modality::parse(row.get("modality")),
            source_uri: row.get("source_uri"),
            created_by: row.get("created_by"),
            state: ProcessingState {
                parsing_status: ParsingStatus::parse(row.get("parsing_status")),
                classification_status: ClassificationStatus::parse(
                    row.get("classification_status"),
                ),
                show_classification: row.get("show_classification"),
            },
            meta: row.get("meta"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl ContentRepository for PgContentRepository {
    async fn insert(&self, req: CreateContentRequest) -> Result<Uuid> {
        let id = new_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO contents
                 (id, title, text, modality, source_uri, created_by,
                  parsing_status, classification_status, show_classification,
                  meta, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, 'pending', 'pending', FALSE, $7, $8, $8)",
        )
        .bind(id)
        .bind(&req.title)
        .bind(&req.text)
        .bind(req.modality.as_str())
        .bind(&req.source_uri)
        .bind(&req.created_by)
        .bind(&req.meta)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn fetch(&self, id: Uuid) -> Result<Content> {
        self.get(id).await?.ok_or(Error::ContentNotFound(id))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Content>> {
        let row = sqlx::query("SELECT * FROM contents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn update_text(&self, id: Uuid, text: &str, meta: Option<JsonValue>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE contents
             SET text = $1,
                 meta = COALESCE(meta, '{}'::jsonb) || COALESCE($2, '{}'::jsonb),
                 updated_at = $3
             WHERE id = $4",
        )
        .bind(text)
        .bind(&meta)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ContentNotFound(id));
        }
        Ok(())
    }

    async fn set_modality(&self, id: Uuid, modality: Modality) -> Result<()> {
        let result = sqlx::query("UPDATE contents SET modality = $1, updated_at = $2 WHERE id = $3")
            .bind(modality.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ContentNotFound(id));
        }
        Ok(())
    }

    async fn set_parsing_status(&self, id: Uuid, status: ParsingStatus) -> Result<()> {
        let current = self.fetch(id).await?.state.parsing_status;
        if current == status {
            return Ok(());
        }
        if !current.can_advance_to(status) {
            warn!(
                content_id = %id,
                from = current.as_str(),
                to = status.as_str(),
                "Refusing parsing status regression"
            );
            return Ok(());
        }

        sqlx::query("UPDATE contents SET parsing_status = $1, updated_at = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn set_classification_status(
        &self,
        id: Uuid,
        status: ClassificationStatus,
    ) -> Result<()> {
        let current = self.fetch(id).await?.state.classification_status;
        if current == status {
            return Ok(());
        }
        if !current.can_advance_to(status) {
            warn!(
                content_id = %id,
                from = current.as_str(),
                to = status.as_str(),
                "Refusing classification status regression"
            );
            return Ok(());
        }

        sqlx::query(
            "UPDATE contents SET classification_status = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn set_show_classification(&self, id: Uuid, show: bool) -> Result<()> {
        let result =
            sqlx::query("UPDATE contents SET show_classification = $1, updated_at = $2 WHERE id = $3")
                .bind(show)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ContentNotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        // Chunks, associations, and signals cascade.
        let result = sqlx::query("DELETE FROM contents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ContentNotFound(id));
        }
        Ok(())
    }

    async fn list_all_ids(&self) -> Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT id FROM contents ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.into_iter().map(|r| r.get("id")).collect())
    }
}
