//! Category taxonomy and content-category association repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use kasten_core::{
    new_v7, Category, CategoryRepository, CategoryRole, ClassificationSource, ContentCategory,
    Error, Result, Taxonomy,
};

/// PostgreSQL implementation of CategoryRepository.
#[derive(Clone)]
pub struct PgCategoryRepository {
    pool: Pool<Postgres>,
}

impl PgCategoryRepository {
    /// Create a new PgCategoryRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_category(row: sqlx::postgres::PgRow) -> Category {
        Category {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            color: row.get("color"),
            is_system: row.get("is_system"),
            created_at: row.get("created_at"),
        }
    }

    fn parse_association(row: sqlx::postgres::PgRow) -> ContentCategory {
        ContentCategory {
            content_id: row.get("content_id"),
            category_id: row.get("category_id"),
            confidence: row.get("confidence"),
            reasoning: row.get("reasoning"),
            role: CategoryRole::parse(row.get("role")),
            source: ClassificationSource::parse(row.get("source")),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn ensure_system_categories(&self) -> Result<()> {
        for spec in Taxonomy::categories() {
            // Upsert keeps existing rows but repairs a lost is_system flag.
            let result = sqlx::query(
                "INSERT INTO categories (id, name, description, color, is_system, created_at)
                 VALUES ($1, $2, $3, $4, TRUE, $5)
                 ON CONFLICT (name) DO UPDATE SET is_system = TRUE
                     WHERE categories.is_system = FALSE",
            )
            .bind(new_v7())
            .bind(spec.name)
            .bind(spec.description)
            .bind(spec.color)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            if result.rows_affected() > 0 {
                info!(category = spec.name, "Seeded system category");
            }
        }
        Ok(())
    }

    async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        color: Option<&str>,
        is_system: bool,
    ) -> Result<Uuid> {
        let id = new_v7();
        sqlx::query(
            "INSERT INTO categories (id, name, description, color, is_system, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(color)
        .bind(is_system)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Category>> {
        let row = sqlx::query("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(Self::parse_category))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        let row = sqlx::query("SELECT * FROM categories WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(Self::parse_category))
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT * FROM categories ORDER BY is_system DESC, created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_category).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let category = self
            .get(id)
            .await?
            .ok_or_else(|| Error::CategoryNotFound(id.to_string()))?;

        if category.is_system {
            return Err(Error::InvalidInput(format!(
                "system category {} is immutable",
                category.name
            )));
        }

        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn upsert_association(&self, assoc: &ContentCategory) -> Result<()> {
        sqlx::query(
            "INSERT INTO content_categories
                 (content_id, category_id, confidence, reasoning, role, source, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (content_id, category_id) DO UPDATE
                 SET confidence = EXCLUDED.confidence,
                     reasoning = EXCLUDED.reasoning,
                     role = EXCLUDED.role,
                     source = EXCLUDED.source,
                     created_at = EXCLUDED.created_at",
        )
        .bind(assoc.content_id)
        .bind(assoc.category_id)
        .bind(assoc.confidence)
        .bind(&assoc.reasoning)
        .bind(assoc.role.as_str())
        .bind(assoc.source.as_str())
        .bind(assoc.created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn association_exists(
        &self,
        content_id: Uuid,
        category_id: Uuid,
        reasoning_like: &str,
    ) -> Result<bool> {
        let pattern = format!("%{}%", crate::escape_like(reasoning_like));
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM content_categories
             WHERE content_id = $1 AND category_id = $2 AND reasoning LIKE $3",
        )
        .bind(content_id)
        .bind(category_id)
        .bind(pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(count.0 > 0)
    }

    async fn has_system_primary(&self, content_id: Uuid) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM content_categories cc
             JOIN categories c ON cc.category_id = c.id
             WHERE cc.content_id = $1 AND cc.role = 'primary_system' AND c.is_system",
        )
        .bind(content_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(count.0 > 0)
    }

    async fn primary_for_content(&self, content_id: Uuid) -> Result<Option<ContentCategory>> {
        // During the arbitration window a heuristic and a model primary can
        // briefly coexist; the newest writer wins for readers.
        let row = sqlx::query(
            "SELECT * FROM content_categories
             WHERE content_id = $1 AND role = 'primary_system'
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_association))
    }

    async fn associations_for_content(&self, content_id: Uuid) -> Result<Vec<ContentCategory>> {
        let rows = sqlx::query(
            "SELECT * FROM content_categories WHERE content_id = $1 ORDER BY created_at",
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_association).collect())
    }

    async fn delete_system_labels(&self, content_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM content_categories
             WHERE content_id = $1 AND role IN ('primary_system', 'secondary_tag')",
        )
        .bind(content_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }
}
