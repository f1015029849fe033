//! Collection repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use kasten_core::{new_v7, Collection, CollectionRepository, Error, QueryRules, Result};

/// PostgreSQL implementation of CollectionRepository.
#[derive(Clone)]
pub struct PgCollectionRepository {
    pool: Pool<Postgres>,
}

impl PgCollectionRepository {
    /// Create a new PgCollectionRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Collection {
        let query_rules: Option<serde_json::Value> = row.get("query_rules");
        Collection {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            category_id: row.get("category_id"),
            auto_generated: row.get("auto_generated"),
            query_rules: query_rules.and_then(|v| serde_json::from_value::<QueryRules>(v).ok()),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl CollectionRepository for PgCollectionRepository {
    async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        category_id: Uuid,
        query_rules: Option<&QueryRules>,
    ) -> Result<Uuid> {
        let id = new_v7();
        let now = Utc::now();
        let rules_json = query_rules.map(serde_json::to_value).transpose()?;

        sqlx::query(
            "INSERT INTO collections
                 (id, name, description, category_id, auto_generated, query_rules,
                  created_at, updated_at)
             VALUES ($1, $2, $3, $4, FALSE, $5, $6, $6)",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(category_id)
        .bind(rules_json)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Collection>> {
        let row = sqlx::query("SELECT * FROM collections WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn list_user(&self) -> Result<Vec<Collection>> {
        let rows = sqlx::query(
            "SELECT * FROM collections WHERE auto_generated = FALSE ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn update_rules(&self, id: Uuid, rules: &QueryRules) -> Result<()> {
        let rules_json = serde_json::to_value(rules)?;
        let result = sqlx::query(
            "UPDATE collections SET query_rules = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(rules_json)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::CollectionNotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let collection = self.get(id).await?.ok_or(Error::CollectionNotFound(id))?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        if let Some(category_id) = collection.category_id {
            // Associations go with the backing category; contents stay.
            sqlx::query("DELETE FROM content_categories WHERE category_id = $1")
                .bind(category_id)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;

            sqlx::query("DELETE FROM categories WHERE id = $1 AND is_system = FALSE")
                .bind(category_id)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}
