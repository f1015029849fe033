//! Keyword relevance scoring.
//!
//! Candidates from the lexical tiers get a fixed score ladder: whole-word
//! matches in body text rank above whole-word title matches, which rank
//! above plain substring hits. Whole-word detection uses `\b` boundaries,
//! which for CJK text degrades gracefully to punctuation boundaries.

use regex::Regex;

/// Score ladder for keyword candidates.
pub const SCORE_BODY_WORD: f32 = 0.95;
pub const SCORE_TITLE_WORD: f32 = 0.90;
pub const SCORE_BODY_SUBSTRING: f32 = 0.70;
pub const SCORE_TITLE_SUBSTRING: f32 = 0.65;
pub const SCORE_WEAK: f32 = 0.50;

/// Split a query into non-empty whitespace-separated words.
pub fn split_words(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|w| w.to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Whether `haystack` contains `needle` on word boundaries.
pub fn whole_word_match(haystack: &str, needle: &str) -> bool {
    let pattern = format!(r"\b{}\b", regex::escape(needle));
    Regex::new(&pattern)
        .map(|re| re.is_match(haystack))
        .unwrap_or(false)
}

/// Relevance score for one candidate chunk against the query.
pub fn relevance_score(text: &str, title: &str, query: &str) -> f32 {
    let text_lower = text.to_lowercase();
    let title_lower = title.to_lowercase();
    let query_lower = query.to_lowercase();

    if whole_word_match(&text_lower, &query_lower) {
        SCORE_BODY_WORD
    } else if whole_word_match(&title_lower, &query_lower) {
        SCORE_TITLE_WORD
    } else if text_lower.contains(&query_lower) {
        SCORE_BODY_SUBSTRING
    } else if title_lower.contains(&query_lower) {
        SCORE_TITLE_SUBSTRING
    } else {
        SCORE_WEAK
    }
}

/// Relevance filter for the loose OR tier: whole-word matches first, then
/// substring matches, up to `top_k` items. `text_title` extracts
/// (text, title) from a candidate.
pub fn filter_by_relevance<T>(
    candidates: Vec<T>,
    query: &str,
    top_k: usize,
    text_title: impl Fn(&T) -> (String, String),
) -> Vec<T> {
    let query_lower = query.to_lowercase();
    let mut strong = Vec::new();
    let mut weak = Vec::new();

    for candidate in candidates {
        let (text, title) = text_title(&candidate);
        let text_lower = text.to_lowercase();
        let title_lower = title.to_lowercase();

        if whole_word_match(&text_lower, &query_lower)
            || whole_word_match(&title_lower, &query_lower)
        {
            strong.push(candidate);
        } else if text_lower.contains(&query_lower) || title_lower.contains(&query_lower) {
            weak.push(candidate);
        } else {
            // Word-level OR hits with no full-query overlap still count,
            // behind everything with a full-query match.
            weak.push(candidate);
        }

        if strong.len() >= top_k {
            break;
        }
    }

    strong.extend(weak);
    strong.truncate(top_k);
    strong
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("rust async runtime"), vec!["rust", "async", "runtime"]);
        assert_eq!(split_words("  单词  "), vec!["单词"]);
        assert!(split_words("").is_empty());
    }

    #[test]
    fn test_whole_word_match_latin() {
        assert!(whole_word_match("the rust language", "rust"));
        assert!(!whole_word_match("trusted systems", "rust"));
    }

    #[test]
    fn test_relevance_ladder() {
        assert_eq!(relevance_score("we use rust here", "notes", "rust"), SCORE_BODY_WORD);
        assert_eq!(relevance_score("nothing here", "rust tips", "rust"), SCORE_TITLE_WORD);
        assert_eq!(
            relevance_score("trusty companion", "notes", "rust"),
            SCORE_BODY_SUBSTRING
        );
        assert_eq!(
            relevance_score("nothing", "crustacean recipes", "rust"),
            SCORE_TITLE_SUBSTRING
        );
        assert_eq!(relevance_score("nothing", "nothing", "rust"), SCORE_WEAK);
    }

    #[test]
    fn test_relevance_ladder_case_insensitive() {
        assert_eq!(relevance_score("We use Rust here", "t", "RUST"), SCORE_BODY_WORD);
    }

    #[test]
    fn test_cjk_substring_scores() {
        // CJK text has no \b word boundaries inside runs; substring tier applies.
        let score = relevance_score("今天的会议纪要已经整理好", "工作记录", "会议纪要");
        assert!(score >= SCORE_BODY_SUBSTRING);
    }

    #[test]
    fn test_filter_by_relevance_prefers_whole_word() {
        let candidates = vec![
            ("trusty tools".to_string(), "a".to_string()),
            ("pure rust code".to_string(), "b".to_string()),
            ("unrelated".to_string(), "c".to_string()),
        ];
        let filtered = filter_by_relevance(candidates, "rust", 2, |c| (c.0.clone(), c.1.clone()));
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].1, "b");
    }
}
