//! Search result deduplication.
//!
//! Contents are chunked, so a single document can surface several times in
//! one candidate list. Results are collapsed to one hit per content,
//! keeping the highest-scoring chunk, before final ranking.

use std::collections::HashMap;

use kasten_core::RankedHit;

/// Collapse hits to one per content, keeping the best-scoring chunk.
/// Output is sorted by score descending.
pub fn dedupe_best_per_content(hits: Vec<RankedHit>) -> Vec<RankedHit> {
    let mut best: HashMap<uuid::Uuid, RankedHit> = HashMap::new();

    for hit in hits {
        match best.get(&hit.content_id) {
            Some(existing) if existing.score >= hit.score => {}
            _ => {
                best.insert(hit.content_id, hit);
            }
        }
    }

    let mut deduped: Vec<RankedHit> = best.into_values().collect();
    deduped.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasten_core::{MatchType, Modality};
    use uuid::Uuid;

    fn hit(content_id: Uuid, score: f32) -> RankedHit {
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
            match_type: MatchType::Keyword,
        }
    }

    #[test]
    fn test_dedupe_keeps_best_chunk() {
        let content = Uuid::new_v4();
        let best_chunk = {
            let mut h = hit(content, 0.9);
            h.text = "best".into();
            h
        };
        let hits = vec![hit(content, 0.5), best_chunk, hit(content, 0.7)];

        let deduped = dedupe_best_per_content(hits);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].score, 0.9);
        assert_eq!(deduped[0].text, "best");
    }

    #[test]
    fn test_dedupe_never_returns_duplicate_contents() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let hits = vec![hit(a, 0.5), hit(b, 0.8), hit(a, 0.6), hit(b, 0.2), hit(a, 0.1)];

        let deduped = dedupe_best_per_content(hits);
        assert_eq!(deduped.len(), 2);
        let ids: Vec<_> = deduped.iter().map(|h| h.content_id).collect();
        assert!(ids.contains(&a) && ids.contains(&b));
        // Sorted descending.
        assert!(deduped[0].score >= deduped[1].score);
    }

    #[test]
    fn test_dedupe_empty() {
        assert!(dedupe_best_per_content(Vec::new()).is_empty());
    }
}
