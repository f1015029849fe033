//! Hybrid search engine: tiered keyword matching fused with semantic
//! vector similarity, one ranked hit per content.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use kasten_core::{
    defaults, EmbeddingBackend, Error, MatchType, RankedHit, Result, SearchFilters, SearchMode,
    SearchResponse,
};
use kasten_db::{Database, KeywordCandidate, PatternCombine, PgSearchRepository, SemanticCandidate};

use crate::dedup::dedupe_best_per_content;
use crate::intent::{expand_terms, QueryIntent};
use crate::keyword::{filter_by_relevance, relevance_score, split_words};

/// Configuration for hybrid search.
#[derive(Debug, Clone)]
pub struct HybridSearchConfig {
    /// Weight for keyword scores in fusion (0.0 to 1.0).
    pub keyword_weight: f32,
    /// Weight for semantic scores in fusion (0.0 to 1.0).
    pub semantic_weight: f32,
    /// Candidate over-fetch multiplier applied to `top_k` before
    /// deduplication collapses chunks.
    pub candidate_multiplier: i64,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            keyword_weight: defaults::FUSION_KEYWORD_WEIGHT,
            semantic_weight: defaults::FUSION_SEMANTIC_WEIGHT,
            candidate_multiplier: 3,
        }
    }
}

impl HybridSearchConfig {
    /// Create a config with custom fusion weights.
    pub fn with_weights(keyword_weight: f32, semantic_weight: f32) -> Self {
        Self {
            keyword_weight,
            semantic_weight,
            ..Default::default()
        }
    }
}

/// The hybrid search engine. Read-only over content/chunk/category state.
pub struct HybridSearchEngine {
    db: Database,
    embedder: Option<Arc<dyn EmbeddingBackend>>,
    config: HybridSearchConfig,
}

impl HybridSearchEngine {
    /// Create an engine. Passing no embedder disables the semantic path.
    pub fn new(db: Database, embedder: Option<Arc<dyn EmbeddingBackend>>) -> Self {
        Self {
            db,
            embedder,
            config: HybridSearchConfig::default(),
        }
    }

    /// Create an engine with custom configuration.
    pub fn with_config(
        db: Database,
        embedder: Option<Arc<dyn EmbeddingBackend>>,
        config: HybridSearchConfig,
    ) -> Self {
        Self {
            db,
            embedder,
            config,
        }
    }

    /// Whether the semantic path is available.
    pub fn embedding_enabled(&self) -> bool {
        self.embedder.is_some()
    }

    /// Execute a search. Internal failures degrade to an empty response
    /// with the error field populated; the call itself never fails.
    #[instrument(skip(self, filters))]
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        mode: SearchMode,
        filters: SearchFilters,
    ) -> SearchResponse {
        let start = Instant::now();
        let query = query.trim();
        let embedding_enabled = self.embedding_enabled();

        let outcome = self.search_inner(query, top_k, mode, filters).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(results) => {
                info!(
                    query,
                    result_count = results.len(),
                    duration_ms = elapsed_ms,
                    "Search completed"
                );
                SearchResponse {
                    query: query.to_string(),
                    mode,
                    total: results.len(),
                    results,
                    response_time_ms: elapsed_ms,
                    embedding_enabled,
                    error: None,
                }
            }
            Err(e) => {
                warn!(query, error = %e, "Search degraded to empty result");
                SearchResponse::degraded(query, mode, elapsed_ms, embedding_enabled, e.to_string())
            }
        }
    }

    async fn search_inner(
        &self,
        query: &str,
        top_k: usize,
        mode: SearchMode,
        filters: SearchFilters,
    ) -> Result<Vec<RankedHit>> {
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let filters = self.resolve_filters(filters).await?;

        match mode {
            SearchMode::Keyword => self.keyword_search(query, &filters, top_k).await,
            SearchMode::Semantic => self.semantic_search(query, &filters, top_k).await,
            SearchMode::Hybrid => {
                let keyword = self.keyword_search(query, &filters, top_k).await?;
                let semantic = self.semantic_search(query, &filters, top_k).await?;
                Ok(fuse_results(
                    keyword,
                    semantic,
                    top_k,
                    self.config.keyword_weight,
                    self.config.semantic_weight,
                ))
            }
        }
    }

    /// Translate a collection filter into its backing category predicate.
    async fn resolve_filters(&self, mut filters: SearchFilters) -> Result<SearchFilters> {
        if let Some(collection_id) = filters.collection_id.take() {
            let category_id = self
                .db
                .search
                .collection_category(collection_id)
                .await?
                .ok_or(Error::CollectionNotFound(collection_id))?;
            if filters.category_id.is_none() {
                filters.category_id = Some(category_id);
            }
        }
        Ok(filters)
    }

    /// Tiered keyword path: exact phrase, then AND of words, then OR of
    /// words with a whole-word-preferring relevance filter.
    async fn keyword_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<RankedHit>> {
        let fetch_limit = (top_k as i64) * self.config.candidate_multiplier;

        // Tier 1: the full query (plus synonyms) as a substring.
        let terms = expand_terms(query);
        let patterns = PgSearchRepository::like_patterns(&terms);
        let mut candidates = self
            .db
            .search
            .keyword_candidates(&patterns, PatternCombine::Any, filters, fetch_limit)
            .await?;

        // Tier 2: every word must appear somewhere.
        if candidates.is_empty() {
            let words = split_words(query);
            if words.len() > 1 {
                let patterns = PgSearchRepository::like_patterns(&words);
                candidates = self
                    .db
                    .search
                    .keyword_candidates(&patterns, PatternCombine::All, filters, fetch_limit)
                    .await?;
            }
        }

        // Tier 3: any word may appear; prefer whole-word matches.
        if candidates.is_empty() {
            let words = split_words(query);
            if !words.is_empty() {
                let patterns = PgSearchRepository::like_patterns(&words);
                let loose = self
                    .db
                    .search
                    .keyword_candidates(&patterns, PatternCombine::Any, filters, fetch_limit * 2)
                    .await?;
                candidates = filter_by_relevance(loose, query, fetch_limit as usize, |c| {
                    (c.text.clone(), c.title.clone())
                });
            }
        }

        debug!(keyword_hits = candidates.len(), "Keyword tier resolved");

        let hits = candidates
            .into_iter()
            .map(|c| keyword_hit(c, query))
            .collect();
        let mut deduped = dedupe_best_per_content(hits);
        deduped.truncate(top_k);
        Ok(deduped)
    }

    /// Semantic path: embed the query, fetch nearest chunks, apply the
    /// query-dependent similarity floor and modality-consistency filter.
    async fn semantic_search(
        &self,
        query: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<RankedHit>> {
        let Some(ref embedder) = self.embedder else {
            debug!("Semantic path disabled: no embedding backend");
            return Ok(Vec::new());
        };

        if self.db.search.embedded_chunk_count().await? == 0 {
            warn!("Semantic path skipped: no chunks carry embeddings");
            return Ok(Vec::new());
        }

        let embeddings = embedder.embed_texts(&[query.to_string()]).await?;
        let query_embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("Empty embedding response for query".to_string()))?;

        let fetch_limit = (top_k as i64) * self.config.candidate_multiplier;
        let candidates = self
            .db
            .search
            .semantic_candidates(&query_embedding, filters, fetch_limit)
            .await?;

        let intent = QueryIntent::infer(query);
        debug!(
            semantic_hits = candidates.len(),
            similarity_floor = intent.similarity_floor,
            "Semantic candidates fetched"
        );

        let hits = candidates
            .into_iter()
            .filter_map(|c| semantic_hit(c, &intent))
            .collect();
        let mut deduped = dedupe_best_per_content(hits);
        deduped.truncate(top_k);
        Ok(deduped)
    }
}

fn keyword_hit(candidate: KeywordCandidate, query: &str) -> RankedHit {
    let score = relevance_score(&candidate.text, &candidate.title, query);
    RankedHit {
        score,
        content_id: candidate.content_id,
        chunk_id: candidate.chunk_id,
        title: candidate.title,
        text: candidate.text,
        source_uri: candidate.source_uri,
        modality: candidate.modality,
        category_name: candidate.category_name,
        category_confidence: candidate.category_confidence,
        match_type: MatchType::Keyword,
    }
}

fn semantic_hit(candidate: SemanticCandidate, intent: &QueryIntent) -> Option<RankedHit> {
    let similarity = 1.0 - candidate.distance;
    if similarity < intent.similarity_floor {
        return None;
    }
    if !intent.modality_allows(candidate.modality, similarity) {
        return None;
    }

    Some(RankedHit {
        score: similarity,
        content_id: candidate.content_id,
        chunk_id: candidate.chunk_id,
        title: candidate.title,
        text: candidate.text,
        source_uri: candidate.source_uri,
        modality: candidate.modality,
        category_name: candidate.category_name,
        category_confidence: candidate.category_confidence,
        match_type: MatchType::Semantic,
    })
}

/// Fuse keyword and semantic hit lists: scale by the fusion weights, sum
/// per content, keep the stronger chunk as the representative, sort, and
/// truncate. Hits present in both lists become `MatchType::Hybrid`.
pub fn fuse_results(
    keyword: Vec<RankedHit>,
    semantic: Vec<RankedHit>,
    top_k: usize,
    keyword_weight: f32,
    semantic_weight: f32,
) -> Vec<RankedHit> {
    let mut merged: std::collections::HashMap<uuid::Uuid, RankedHit> = std::collections::HashMap::new();

    for mut hit in keyword {
        hit.score *= keyword_weight;
        merged.insert(hit.content_id, hit);
    }

    for mut hit in semantic {
        let scaled = hit.score * semantic_weight;
        match merged.get_mut(&hit.content_id) {
            Some(existing) => {
                let combined = existing.score + scaled;
                if scaled > existing.score {
                    // The semantic chunk is the stronger representative.
                    hit.score = combined;
                    hit.match_type = MatchType::Hybrid;
                    merged.insert(hit.content_id, hit);
                } else {
                    existing.score = combined;
                    existing.match_type = MatchType::Hybrid;
                }
            }
            None => {
                hit.score = scaled;
                merged.insert(hit.content_id, hit);
            }
        }
    }

    let mut results: Vec<RankedHit> = merged.into_values().collect();
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(top_k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasten_core::Modality;
    use uuid::Uuid;

    fn hit(content_id: Uuid, score: f32, match_type: MatchType) -> RankedHit {
        RankedHit {
            score,
            content_id,
            chunk_id: Uuid::new_v4(),
            title: "t".into(),
            text: "x".into(),
            source_uri: None,
            modality: Modality::Text,
            category_name: None,
            category_confidence: None,
            match_type,
        }
    }

    #[test]
    fn test_fusion_weights_lone_semantic_hit() {
        // Zero keyword hits, one semantic hit at 0.6 => 0.6 × 0.4 = 0.24.
        let content = Uuid::new_v4();
        let results = fuse_results(
            Vec::new(),
            vec![hit(content, 0.6, MatchType::Semantic)],
            10,
            defaults::FUSION_KEYWORD_WEIGHT,
            defaults::FUSION_SEMANTIC_WEIGHT,
        );
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.24).abs() < 1e-6);
        assert_eq!(results[0].match_type, MatchType::Semantic);
    }

    #[test]
    fn test_fusion_sums_per_content() {
        let content = Uuid::new_v4();
        let results = fuse_results(
            vec![hit(content, 0.95, MatchType::Keyword)],
            vec![hit(content, 0.5, MatchType::Semantic)],
            10,
            0.6,
            0.4,
        );
        assert_eq!(results.len(), 1);
        // 0.95×0.6 + 0.5×0.4 = 0.77
        assert!((results[0].score - 0.77).abs() < 1e-6);
        assert_eq!(results[0].match_type, MatchType::Hybrid);
    }

    #[test]
    fn test_fusion_dedup_invariant() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let results = fuse_results(
            vec![hit(a, 0.9, MatchType::Keyword), hit(b, 0.7, MatchType::Keyword)],
            vec![hit(a, 0.8, MatchType::Semantic), hit(b, 0.3, MatchType::Semantic)],
            10,
            0.6,
            0.4,
        );
        let mut ids: Vec<_> = results.iter().map(|h| h.content_id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), results.len());
    }

    #[test]
    fn test_fusion_sorts_and_truncates() {
        let hits: Vec<RankedHit> = (0..5)
            .map(|i| hit(Uuid::new_v4(), 0.1 * (i as f32 + 1.0), MatchType::Keyword))
            .collect();
        let results = fuse_results(hits, Vec::new(), 3, 0.6, 0.4);
        assert_eq!(results.len(), 3);
        assert!(results[0].score >= results[1].score);
        assert!(results[1].score >= results[2].score);
    }

    #[test]
    fn test_fusion_prefers_stronger_semantic_chunk() {
        let content = Uuid::new_v4();
        let mut kw = hit(content, 0.5, MatchType::Keyword);
        kw.text = "keyword chunk".into();
        let mut sem = hit(content, 0.9, MatchType::Semantic);
        sem.text = "semantic chunk".into();

        // keyword scaled 0.30, semantic scaled 0.36 > 0.30: semantic chunk wins.
        let results = fuse_results(vec![kw], vec![sem], 10, 0.6, 0.4);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "semantic chunk");
        assert_eq!(results[0].match_type, MatchType::Hybrid);
        assert!((results[0].score - 0.66).abs() < 1e-6);
    }

    #[test]
    fn test_config_defaults() {
        let config = HybridSearchConfig::default();
        assert_eq!(config.keyword_weight, 0.6);
        assert_eq!(config.semantic_weight, 0.4);
    }
}
