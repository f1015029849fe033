//! Query-intent inference.
//!
//! The semantic path tunes itself to the query: image-seeking queries get
//! a stricter similarity floor and a modality-consistency filter, and
//! known synonym groups widen the first keyword tier.

use once_cell::sync::Lazy;

use kasten_core::{defaults, Modality};

/// Keywords suggesting the query targets images.
const IMAGE_KEYWORDS: &[&str] = &[
    "照片", "图片", "图像", "拍照", "摄影", "风景", "山顶", "海边", "建筑", "人像",
];

/// Keywords suggesting a technical-term query.
const TECHNICAL_KEYWORDS: &[&str] = &[
    "机器学习", "人工智能", "深度学习", "算法", "技术", "编程", "开发",
];

/// Keywords suggesting the query targets PDF documents.
const PDF_KEYWORDS: &[&str] = &["报告", "文档", "论文", "研究", "分析", "白皮书"];

/// Synonym groups expanded into the first keyword tier.
static SYNONYMS: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        ("领英", vec!["LinkedIn", "linkedin", "领英网"]),
        ("LinkedIn", vec!["领英", "linkedin"]),
        ("AI", vec!["人工智能", "人工智慧", "ai"]),
        ("人工智能", vec!["AI", "ai", "人工智慧"]),
        ("报告", vec!["报表", "分析", "研究"]),
        ("人才", vec!["人员", "员工", "专业人士"]),
    ]
});

/// Inferred properties of a search query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryIntent {
    /// Modality the query appears to target, if any.
    pub expected_modality: Option<Modality>,
    /// Minimum semantic similarity for this query.
    pub similarity_floor: f32,
}

impl QueryIntent {
    /// Infer intent from the query text.
    pub fn infer(query: &str) -> Self {
        let query_lower = query.to_lowercase();

        let is_image = IMAGE_KEYWORDS.iter().any(|k| query_lower.contains(k));
        let is_technical = TECHNICAL_KEYWORDS.iter().any(|k| query_lower.contains(k));
        let is_pdf = PDF_KEYWORDS.iter().any(|k| query_lower.contains(k));

        let expected_modality = if is_image {
            Some(Modality::Image)
        } else if is_pdf {
            Some(Modality::Pdf)
        } else {
            None
        };

        let similarity_floor = if is_image {
            defaults::SIMILARITY_FLOOR_IMAGE
        } else if is_technical {
            defaults::SIMILARITY_FLOOR_TECHNICAL
        } else {
            defaults::SIMILARITY_FLOOR_DEFAULT
        };

        Self {
            expected_modality,
            similarity_floor,
        }
    }

    /// Modality-consistency check for a semantic candidate. A mismatched
    /// modality is discarded unless similarity clears an elevated bar:
    /// 0.40 in general, 0.45 when the query expects images but the
    /// candidate is text.
    pub fn modality_allows(&self, candidate: Modality, similarity: f32) -> bool {
        let Some(expected) = self.expected_modality else {
            return true;
        };
        if expected == candidate {
            return true;
        }

        let required = if expected == Modality::Image
            && matches!(candidate, Modality::Text | Modality::Pdf)
        {
            defaults::IMAGE_EXPECTED_TEXT_SIMILARITY
        } else {
            defaults::CROSS_MODALITY_SIMILARITY
        };
        similarity > required
    }
}

/// Expand a query into its synonym-widened term list. The original query
/// always comes first; duplicates are removed.
pub fn expand_terms(query: &str) -> Vec<String> {
    let mut terms = vec![query.to_string()];

    for (word, variants) in SYNONYMS.iter() {
        if query.contains(word) {
            terms.extend(variants.iter().map(|v| v.to_string()));
        }
    }

    let mut seen = std::collections::HashSet::new();
    terms.retain(|t| seen.insert(t.clone()));
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_query_intent() {
        let intent = QueryIntent::infer("山顶的风景照片");
        assert_eq!(intent.expected_modality, Some(Modality::Image));
        assert_eq!(intent.similarity_floor, 0.35);
    }

    #[test]
    fn test_technical_query_intent() {
        let intent = QueryIntent::infer("机器学习入门");
        assert_eq!(intent.expected_modality, None);
        assert_eq!(intent.similarity_floor, 0.28);
    }

    #[test]
    fn test_pdf_query_intent() {
        let intent = QueryIntent::infer("年度分析报告");
        assert_eq!(intent.expected_modality, Some(Modality::Pdf));
        assert_eq!(intent.similarity_floor, 0.25);
    }

    #[test]
    fn test_general_query_intent() {
        let intent = QueryIntent::infer("上海 天气");
        assert_eq!(intent.expected_modality, None);
        assert_eq!(intent.similarity_floor, 0.25);
    }

    #[test]
    fn test_modality_filter_boundary_similarities() {
        // Image-seeking query against a text chunk: 0.30 out, 0.50 in.
        let intent = QueryIntent::infer("海边的照片");
        assert!(!intent.modality_allows(Modality::Text, 0.30));
        assert!(intent.modality_allows(Modality::Text, 0.50));
        // Matching modality always passes.
        assert!(intent.modality_allows(Modality::Image, 0.30));
    }

    #[test]
    fn test_image_expected_text_found_elevated_bar() {
        let intent = QueryIntent::infer("拍照留念");
        // 0.42 clears the generic 0.40 bar but not the image-vs-text 0.45 bar.
        assert!(!intent.modality_allows(Modality::Text, 0.42));
        assert!(!intent.modality_allows(Modality::Pdf, 0.42));
        assert!(intent.modality_allows(Modality::Text, 0.46));
    }

    #[test]
    fn test_pdf_expected_mismatch_generic_bar() {
        let intent = QueryIntent::infer("研究论文");
        assert_eq!(intent.expected_modality, Some(Modality::Pdf));
        assert!(!intent.modality_allows(Modality::Text, 0.38));
        assert!(intent.modality_allows(Modality::Text, 0.41));
    }

    #[test]
    fn test_no_expectation_allows_everything() {
        let intent = QueryIntent::infer("随便");
        assert!(intent.modality_allows(Modality::Image, 0.01));
        assert!(intent.modality_allows(Modality::Pdf, 0.01));
    }

    #[test]
    fn test_expand_terms_synonyms() {
        let terms = expand_terms("领英上的AI人才");
        assert_eq!(terms[0], "领英上的AI人才");
        assert!(terms.contains(&"LinkedIn".to_string()));
        assert!(terms.contains(&"人工智能".to_string()));
        assert!(terms.contains(&"员工".to_string()));
        // Deduplicated.
        let unique: std::collections::HashSet<_> = terms.iter().collect();
        assert_eq!(unique.len(), terms.len());
    }

    #[test]
    fn test_expand_terms_plain_query() {
        assert_eq!(expand_terms("会议纪要"), vec!["会议纪要".to_string()]);
    }
}
