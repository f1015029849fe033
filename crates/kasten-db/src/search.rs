//! Search candidate queries.
//!
//! The hybrid engine in `kasten-search` ranks and fuses; this module only
//! fetches candidate chunks. Filters are applied as SQL predicates so that
//! filtered-out chunks never reach scoring or distance computation.

use pgvector::Vector;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use kasten_core::{defaults, Error, Modality, Result, SearchFilters};

use crate::escape_like;

/// A chunk candidate from the keyword path.
#[derive(Debug, Clone)]
pub struct KeywordCandidate {
    pub chunk_id: Uuid,
    pub content_id: Uuid,
    pub text: String,
    pub title: String,
    pub source_uri: Option<String>,
    pub modality: Modality,
    pub category_name: Option<String>,
    pub category_confidence: Option<f32>,
}

/// A chunk candidate from the semantic path, with its cosine distance.
#[derive(Debug, Clone)]
pub struct SemanticCandidate {
    pub chunk_id: Uuid,
    pub content_id: Uuid,
    pub text: String,
    pub title: String,
    pub source_uri: Option<String>,
    pub modality: Modality,
    pub category_name: Option<String>,
    pub category_confidence: Option<f32>,
    pub distance: f32,
}

/// How multiple keyword patterns combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternCombine {
    /// Every pattern must match (AND tier).
    All,
    /// Any pattern may match (OR tier).
    Any,
}

/// PostgreSQL candidate queries for the search engine.
#[derive(Clone)]
pub struct PgSearchRepository {
    pool: Pool<Postgres>,
}

/// Shared candidate projection: chunk joined to its content plus the
/// newest primary label for display.
const CANDIDATE_SELECT: &str = "\
    SELECT ch.id AS chunk_id, ch.text, c.id AS content_id, c.title,
           c.source_uri, c.modality,
           disp.name AS category_name, disp.confidence AS category_confidence";

const CANDIDATE_FROM: &str = "\
    FROM chunks ch
    JOIN contents c ON ch.content_id = c.id
    LEFT JOIN LATERAL (
        SELECT cat.name, cc.confidence
        FROM content_categories cc
        JOIN categories cat ON cc.category_id = cat.id
        WHERE cc.content_id = c.id AND cc.role = 'primary_system'
        ORDER BY cc.created_at DESC
        LIMIT 1
    ) disp ON TRUE";

impl PgSearchRepository {
    /// Create a new PgSearchRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Build ILIKE patterns for a list of terms.
    pub fn like_patterns(terms: &[String]) -> Vec<String> {
        terms
            .iter()
            .map(|t| format!("%{}%", escape_like(t)))
            .collect()
    }

    /// Resolve a collection to its backing category id, if any.
    pub async fn collection_category(&self, collection_id: Uuid) -> Result<Option<Uuid>> {
        let row = sqlx::query("SELECT category_id FROM collections WHERE id = $1")
            .bind(collection_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.and_then(|r| r.get("category_id")))
    }

    /// Number of chunks carrying an embedding.
    pub async fn embedded_chunk_count(&self) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM chunks WHERE embedding IS NOT NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(count.0)
    }

    /// Fetch keyword candidates: chunks whose text or title matches the
    /// given ILIKE patterns, combined with AND or OR semantics.
    pub async fn keyword_candidates(
        &self,
        patterns: &[String],
        combine: PatternCombine,
        filters: &SearchFilters,
        limit: i64,
    ) -> Result<Vec<KeywordCandidate>> {
        if patterns.is_empty() {
            return Ok(Vec::new());
        }

        // Params: $1 patterns, $2 combine-all, $3..$10 filters, $11 limit.
        let sql = format!(
            "{CANDIDATE_SELECT}\n{CANDIDATE_FROM}\n\
             WHERE (SELECT CASE WHEN $2 THEN bool_and(t.m) ELSE bool_or(t.m) END\n\
                    FROM (SELECT (ch.text ILIKE p OR c.title ILIKE p) AS m\n\
                          FROM unnest($1::text[]) AS p) t)\n\
             {}\n\
             ORDER BY c.created_at DESC\n\
             LIMIT $11",
            filter_clause(3)
        );

        let rows = bind_filters(sqlx::query(&sql).bind(patterns).bind(combine == PatternCombine::All), filters)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_keyword_row).collect())
    }

    /// Fetch semantic candidates: embedded chunks within the maximum
    /// cosine distance, closest first.
    pub async fn semantic_candidates(
        &self,
        query_embedding: &Vector,
        filters: &SearchFilters,
        limit: i64,
    ) -> Result<Vec<SemanticCandidate>> {
        // Params: $1 embedding, $2..$9 filters, $10 max distance, $11 limit.
        let sql = format!(
            "{CANDIDATE_SELECT}, (ch.embedding <=> $1) AS distance\n{CANDIDATE_FROM}\n\
             WHERE ch.embedding IS NOT NULL\n\
               AND (ch.embedding <=> $1) < $10\n\
             {}\n\
             ORDER BY ch.embedding <=> $1\n\
             LIMIT $11",
            filter_clause(2)
        );

        let rows = bind_filters(sqlx::query(&sql).bind(query_embedding), filters)
            .bind(defaults::SEMANTIC_MAX_DISTANCE as f64)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_semantic_row).collect())
    }

    fn parse_keyword_row(row: PgRow) -> KeywordCandidate {
        KeywordCandidate {
            chunk_id: row.get("chunk_id"),
            content_id: row.get("content_id"),
            text: row.get("text"),
            title: row.get("title"),
            source_uri: row.get("source_uri"),
            modality: Modality::parse(row.get("modality")),
            category_name: row.get("category_name"),
            category_confidence: row.get("category_confidence"),
        }
    }

    fn parse_semantic_row(row: PgRow) -> SemanticCandidate {
        SemanticCandidate {
            chunk_id: row.get("chunk_id"),
            content_id: row.get("content_id"),
            text: row.get("text"),
            title: row.get("title"),
            source_uri: row.get("source_uri"),
            modality: Modality::parse(row.get("modality")),
            category_name: row.get("category_name"),
            category_confidence: row.get("category_confidence"),
            distance: row.get::<f64, _>("distance") as f32,
        }
    }
}

/// Association-level filters go through an EXISTS subquery so unclassified
/// contents survive when no association predicate is set. `start` is the
/// placeholder index of the first filter parameter (8 in total: modality,
/// category id, category name, min/max confidence, role, source,
/// has-association-filters).
fn filter_clause(start: usize) -> String {
    let p: Vec<String> = (start..start + 8).map(|i| format!("${}", i)).collect();
    format!(
        "AND ({m}::text IS NULL OR c.modality = {m})\n\
         AND (NOT {has} OR EXISTS (\n\
             SELECT 1 FROM content_categories cc2\n\
             JOIN categories cat2 ON cc2.category_id = cat2.id\n\
             WHERE cc2.content_id = c.id\n\
               AND ({cid}::uuid IS NULL OR cc2.category_id = {cid})\n\
               AND ({cname}::text IS NULL OR cat2.name = {cname})\n\
               AND ({minc}::real IS NULL OR cc2.confidence >= {minc})\n\
               AND ({maxc}::real IS NULL OR cc2.confidence <= {maxc})\n\
               AND ({role}::text IS NULL OR cc2.role = {role})\n\
               AND ({source}::text IS NULL OR cc2.source = {source})\n\
         ))",
        m = p[0],
        cid = p[1],
        cname = p[2],
        minc = p[3],
        maxc = p[4],
        role = p[5],
        source = p[6],
        has = p[7],
    )
}

fn bind_filters<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    filters: &'q SearchFilters,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(filters.modality.map(|m| m.as_str()))
        .bind(filters.category_id)
        .bind(&filters.category_name)
        .bind(filters.min_confidence)
        .bind(filters.max_confidence)
        .bind(filters.role.map(|r| r.as_str()))
        .bind(filters.source.map(|s| s.as_str()))
        .bind(has_association_filters(filters))
}

fn has_association_filters(filters: &SearchFilters) -> bool {
    filters.category_id.is_some()
        || filters.category_name.is_some()
        || filters.min_confidence.is_some()
        || filters.max_confidence.is_some()
        || filters.role.is_some()
        || filters.source.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_patterns_escape_wildcards() {
        let patterns =
            PgSearchRepository::like_patterns(&["50%".to_string(), "机器学习".to_string()]);
        assert_eq!(patterns[0], "%50\\%%");
        assert_eq!(patterns[1], "%机器学习%");
    }

    #[test]
    fn test_has_association_filters() {
        let mut filters = SearchFilters::new();
        assert!(!has_association_filters(&filters));
        filters.modality = Some(Modality::Image);
        assert!(!has_association_filters(&filters));
        filters.min_confidence = Some(0.5);
        assert!(has_association_filters(&filters));
    }

    #[test]
    fn test_filter_clause_numbering() {
        let clause = filter_clause(3);
        assert!(clause.contains("$3::text IS NULL OR c.modality = $3"));
        assert!(clause.contains("NOT $10"));
        assert!(!clause.contains("$11"));
    }
}
