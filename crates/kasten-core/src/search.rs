//! Search request/response types shared by the engine and its callers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CategoryRole, ClassificationSource, Modality};

/// Search execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keyword,
    Semantic,
    #[default]
    Hybrid,
}

/// How a hit matched the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Keyword,
    Semantic,
    Hybrid,
}

/// Query-time filter predicates, applied in SQL before scoring so that
/// filtered-out chunks never reach distance computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Restrict to a single modality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modality: Option<Modality>,
    /// Restrict to a category by id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    /// Restrict to a category by exact name (ignored when `category_id` set).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    /// Restrict to members of a collection (via its backing category).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<Uuid>,
    /// Minimum classification confidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f32>,
    /// Maximum classification confidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_confidence: Option<f32>,
    /// Restrict to associations with this role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<CategoryRole>,
    /// Restrict to associations with this source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ClassificationSource>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no predicate is set.
    pub fn is_empty(&self) -> bool {
        self.modality.is_none()
            && self.category_id.is_none()
            && self.category_name.is_none()
            && self.collection_id.is_none()
            && self.min_confidence.is_none()
            && self.max_confidence.is_none()
            && self.role.is_none()
            && self.source.is_none()
    }

    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = Some(modality);
        self
    }

    pub fn with_category_id(mut self, id: Uuid) -> Self {
        self.category_id = Some(id);
        self
    }

    pub fn with_category_name(mut self, name: impl Into<String>) -> Self {
        self.category_name = Some(name.into());
        self
    }

    pub fn with_collection(mut self, id: Uuid) -> Self {
        self.collection_id = Some(id);
        self
    }

    pub fn with_confidence_range(mut self, min: Option<f32>, max: Option<f32>) -> Self {
        self.min_confidence = min;
        self.max_confidence = max;
        self
    }

    pub fn with_role(mut self, role: CategoryRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_source(mut self, source: ClassificationSource) -> Self {
        self.source = Some(source);
        self
    }
}

/// A ranked search hit, deduplicated to one entry per content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedHit {
    pub score: f32,
    pub content_id: Uuid,
    pub chunk_id: Uuid,
    pub title: String,
    pub text: String,
    pub source_uri: Option<String>,
    pub modality: Modality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_confidence: Option<f32>,
    pub match_type: MatchType,
}

/// Search response envelope. On internal failure `results` is empty and
/// `error` is populated instead of raising, so callers stay available
/// during partial outages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: SearchMode,
    pub results: Vec<RankedHit>,
    pub total: usize,
    pub response_time_ms: u64,
    pub embedding_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    /// Build a degraded empty response carrying the failure.
    pub fn degraded(
        query: impl Into<String>,
        mode: SearchMode,
        elapsed_ms: u64,
        embedding_enabled: bool,
        error: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            mode,
            results: Vec::new(),
            total: 0,
            response_time_ms: elapsed_ms,
            embedding_enabled,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_is_empty() {
        assert!(SearchFilters::new().is_empty());
        assert!(!SearchFilters::new().with_modality(Modality::Image).is_empty());
        assert!(!SearchFilters::new()
            .with_confidence_range(Some(0.5), None)
            .is_empty());
    }

    #[test]
    fn test_filters_builder() {
        let id = Uuid::new_v4();
        let filters = SearchFilters::new()
            .with_category_id(id)
            .with_role(CategoryRole::PrimarySystem)
            .with_source(ClassificationSource::Ml);
        assert_eq!(filters.category_id, Some(id));
        assert_eq!(filters.role, Some(CategoryRole::PrimarySystem));
        assert_eq!(filters.source, Some(ClassificationSource::Ml));
    }

    #[test]
    fn test_degraded_response() {
        let resp = SearchResponse::degraded("q", SearchMode::Hybrid, 12, false, "db down");
        assert!(resp.results.is_empty());
        assert_eq!(resp.total, 0);
        assert_eq!(resp.error.as_deref(), Some("db down"));
    }

    #[test]
    fn test_search_mode_default() {
        assert_eq!(SearchMode::default(), SearchMode::Hybrid);
    }
}
