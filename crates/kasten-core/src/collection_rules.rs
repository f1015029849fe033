//! Collection auto-match rules: generation from the collection name and
//! the weighted scoring that folds documents into collections.
//!
//! Rules are generated once per collection (or lazily on first match) and
//! persisted as the collection's `query_rules`. Scoring is pure: the jobs
//! crate supplies content rows and creates associations for matches.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::models::Modality;

/// Generated auto-match rules persisted on a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRules {
    pub keywords: Vec<String>,
    pub title_patterns: Vec<String>,
    pub content_patterns: Vec<String>,
    pub auto_match: bool,
    pub match_threshold: f32,
}

/// Seed dictionary of domain term clusters. A collection name that
/// contains (or is contained by) a cluster key inherits its keywords.
static SEED_CLUSTERS: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            "会议纪要",
            vec!["会议", "纪要", "meeting", "minutes", "议题", "决议", "参会"],
        ),
        (
            "项目文档",
            vec!["项目", "project", "计划", "方案", "需求", "设计"],
        ),
        (
            "技术文档",
            vec!["技术", "开发", "代码", "API", "架构", "设计"],
        ),
        (
            "工作总结",
            vec!["总结", "汇报", "报告", "review", "summary"],
        ),
        (
            "学习笔记",
            vec!["学习", "笔记", "note", "教程", "课程", "培训"],
        ),
        (
            "重要文档",
            vec!["重要", "关键", "核心", "urgent", "important"],
        ),
        (
            "旅游",
            vec![
                "旅游", "旅行", "度假", "vacation", "travel", "景点", "风景", "门票", "乐园",
                "机票", "酒店",
            ],
        ),
        (
            "健康",
            vec!["健康", "医疗", "运动", "fitness", "health", "锻炼"],
        ),
    ]
});

/// Obvious-match override table: (collection-name substring, trigger
/// keywords). When a trigger appears in the document title, the effective
/// match threshold drops to [`defaults::OBVIOUS_MATCH_THRESHOLD`].
static OBVIOUS_TRIGGERS: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            "旅游",
            vec!["迪士尼", "乐园", "门票", "机票", "酒店", "景区", "海滩"],
        ),
        ("会议", vec!["纪要", "例会", "周会", "晨会", "复盘"]),
        ("学习", vec!["教程", "课件", "讲义"]),
        ("健康", vec!["体检", "健身", "锻炼"]),
    ]
});

/// Common description words worth promoting into keywords.
const DESCRIPTION_KEYWORDS: &[&str] = &[
    "会议", "项目", "工作", "技术", "学习", "重要", "文档", "资料", "照片", "旅行",
    "meeting", "project", "work", "tech", "study", "important", "document",
];

/// Structured fields parsed out of an image-analysis text blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageAnalysis {
    pub scene_description: Option<String>,
    pub activity_inference: Option<String>,
    pub key_elements: Option<String>,
}

impl ImageAnalysis {
    /// True when no structured section was found.
    pub fn is_empty(&self) -> bool {
        self.scene_description.is_none()
            && self.activity_inference.is_none()
            && self.key_elements.is_none()
    }
}

/// Per-component match score breakdown for one (content, collection) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchBreakdown {
    pub title: f32,
    pub body: f32,
    pub structured: f32,
    pub total: f32,
    /// Threshold actually applied (lowered when an obvious trigger fired).
    pub threshold: f32,
    pub obvious_trigger: bool,
}

/// Rule generation and scoring for collection auto-matching.
pub struct RuleGenerator;

impl RuleGenerator {
    /// Generate auto-match rules from a collection name and optional
    /// description.
    pub fn generate(name: &str, description: Option<&str>) -> QueryRules {
        let mut keywords: Vec<String> = Vec::new();

        for (cluster, words) in SEED_CLUSTERS.iter() {
            if name.contains(cluster) || cluster.contains(name) {
                keywords.extend(words.iter().map(|w| w.to_string()));
            }
        }

        keywords.extend(tokenize_name(name));
        keywords.push(name.to_string());

        if let Some(desc) = description {
            let desc_lower = desc.to_lowercase();
            for keyword in DESCRIPTION_KEYWORDS {
                if desc_lower.contains(&keyword.to_lowercase()) {
                    keywords.push(keyword.to_string());
                }
            }
        }

        // Dedup preserving first-seen order.
        let mut seen = std::collections::HashSet::new();
        keywords.retain(|k| seen.insert(k.clone()));

        let title_patterns = title_patterns_for(name, &keywords);
        let content_patterns = content_patterns_for(&keywords);

        QueryRules {
            keywords,
            title_patterns,
            content_patterns,
            auto_match: true,
            match_threshold: defaults::MATCH_THRESHOLD,
        }
    }

    /// Compute the weighted match score for a document against a
    /// collection's rules and decide whether it matches.
    ///
    /// Weighting: title 0.3, body 0.4, structured image fields 0.3.
    /// The structured component only applies to image-modality content.
    pub fn score(
        collection_name: &str,
        rules: &QueryRules,
        title: &str,
        text: &str,
        modality: Modality,
    ) -> MatchBreakdown {
        let title_score = title_match_score(title, rules);
        let body_score = body_match_score(text, rules);
        let structured_score = if modality == Modality::Image {
            structured_match_score(text, &rules.keywords)
        } else {
            0.0
        };

        let total = 0.3 * title_score + 0.4 * body_score + 0.3 * structured_score;

        let obvious_trigger = obvious_trigger_fired(collection_name, title);
        let threshold = if obvious_trigger {
            defaults::OBVIOUS_MATCH_THRESHOLD
        } else {
            rules.match_threshold
        };

        MatchBreakdown {
            title: title_score,
            body: body_score,
            structured: structured_score,
            total,
            threshold,
            obvious_trigger,
        }
    }

    /// Whether a breakdown constitutes a match.
    pub fn is_match(breakdown: &MatchBreakdown) -> bool {
        breakdown.total >= breakdown.threshold
    }
}

/// Naive tokenization of a collection name: CJK runs of at least 2 chars
/// and Latin runs of at least 3 chars.
fn tokenize_name(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut cjk = String::new();
    let mut latin = String::new();

    let flush_cjk = |buf: &mut String, out: &mut Vec<String>| {
        if buf.chars().count() >= 2 {
            out.push(buf.clone());
        }
        buf.clear();
    };
    let flush_latin = |buf: &mut String, out: &mut Vec<String>| {
        if buf.len() >= 3 {
            out.push(buf.clone());
        }
        buf.clear();
    };

    for ch in name.chars() {
        if is_cjk(ch) {
            flush_latin(&mut latin, &mut tokens);
            cjk.push(ch);
        } else if ch.is_ascii_alphanumeric() {
            flush_cjk(&mut cjk, &mut tokens);
            latin.push(ch);
        } else {
            flush_cjk(&mut cjk, &mut tokens);
            flush_latin(&mut latin, &mut tokens);
        }
    }
    flush_cjk(&mut cjk, &mut tokens);
    flush_latin(&mut latin, &mut tokens);

    tokens
}

fn is_cjk(ch: char) -> bool {
    matches!(ch, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}')
}

/// Title regex patterns: the literal name plus leading keywords, capped.
fn title_patterns_for(name: &str, keywords: &[String]) -> Vec<String> {
    let mut patterns = vec![format!(".*{}.*", regex::escape(name))];
    for keyword in keywords {
        if patterns.len() >= defaults::MAX_TITLE_PATTERNS {
            break;
        }
        if keyword == name {
            continue;
        }
        patterns.push(format!(".*{}.*", regex::escape(keyword)));
    }
    patterns
}

/// Content substring patterns for recognized domains.
fn content_patterns_for(keywords: &[String]) -> Vec<String> {
    let mut patterns: Vec<String> = Vec::new();

    let has = |w: &str| keywords.iter().any(|k| k == w);

    if has("会议") || has("meeting") || has("纪要") || has("minutes") {
        patterns.extend(
            [
                "会议时间", "参会人员", "会议议题", "会议内容", "决议事项", "meeting time",
                "attendees", "agenda", "action items",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
    }

    if has("项目") || has("project") {
        patterns.extend(
            ["项目背景", "项目目标", "里程碑", "deliverable", "timeline"]
                .iter()
                .map(|s| s.to_string()),
        );
    }

    patterns
}

/// Title component: `min(0.7, 0.2 × keyword hits) + 0.3 × pattern fraction`.
fn title_match_score(title: &str, rules: &QueryRules) -> f32 {
    if title.is_empty() {
        return 0.0;
    }
    let title_lower = title.to_lowercase();
    let mut score = 0.0f32;

    let keyword_hits = rules
        .keywords
        .iter()
        .filter(|k| title_lower.contains(&k.to_lowercase()))
        .count();
    score += (0.2 * keyword_hits as f32).min(0.7);

    if !rules.title_patterns.is_empty() {
        let matched = rules
            .title_patterns
            .iter()
            .filter(|p| {
                Regex::new(&format!("(?i){}", p))
                    .map(|re| re.is_match(title))
                    .unwrap_or(false)
            })
            .count();
        score += 0.3 * (matched as f32 / rules.title_patterns.len() as f32);
    }

    score.min(1.0)
}

/// Body component over the first 1000 chars:
/// `min(0.6, 0.15 × keyword hits) + 0.4 × content-pattern fraction`.
fn body_match_score(text: &str, rules: &QueryRules) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let sample: String = text
        .chars()
        .take(defaults::MATCH_BODY_CHARS)
        .collect::<String>()
        .to_lowercase();
    let mut score = 0.0f32;

    let keyword_hits = rules
        .keywords
        .iter()
        .filter(|k| sample.contains(&k.to_lowercase()))
        .count();
    score += (0.15 * keyword_hits as f32).min(0.6);

    if !rules.content_patterns.is_empty() {
        let matched = rules
            .content_patterns
            .iter()
            .filter(|p| sample.contains(&p.to_lowercase()))
            .count();
        score += 0.4 * (matched as f32 / rules.content_patterns.len() as f32);
    }

    score.min(1.0)
}

/// Structured component: keyword overlap against the parsed image-analysis
/// sections. Scene contributes up to 0.8, activity up to 0.6, key elements
/// up to 0.4; the sum is capped at 1.0.
fn structured_match_score(text: &str, keywords: &[String]) -> f32 {
    let analysis = parse_image_analysis(text);
    if analysis.is_empty() {
        return 0.0;
    }

    let overlap = |section: &Option<String>| -> usize {
        section
            .as_deref()
            .map(|s| {
                let lower = s.to_lowercase();
                keywords
                    .iter()
                    .filter(|k| lower.contains(&k.to_lowercase()))
                    .count()
            })
            .unwrap_or(0)
    };

    let scene = (0.4 * overlap(&analysis.scene_description) as f32).min(0.8);
    let activity = (0.3 * overlap(&analysis.activity_inference) as f32).min(0.6);
    let elements = (0.2 * overlap(&analysis.key_elements) as f32).min(0.4);

    (scene + activity + elements).min(1.0)
}

/// Parse the delimited sections of an image-analysis blob. Unknown
/// sections (text content, sentiment, suggestions) are ignored.
pub fn parse_image_analysis(text: &str) -> ImageAnalysis {
    ImageAnalysis {
        scene_description: extract_section(text, "【场景描述】"),
        activity_inference: extract_section(text, "【活动推理】")
            .or_else(|| extract_section(text, "【活动推断】")),
        key_elements: extract_section(text, "【关键元素】"),
    }
}

/// Grab the text between a `【…】` marker and the next marker (or end).
fn extract_section(text: &str, marker: &str) -> Option<String> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let end = rest.find('【').unwrap_or(rest.len());
    let section = rest[..end].trim();
    if section.is_empty() {
        None
    } else {
        Some(section.to_string())
    }
}

fn obvious_trigger_fired(collection_name: &str, title: &str) -> bool {
    OBVIOUS_TRIGGERS.iter().any(|(name_part, triggers)| {
        collection_name.contains(name_part) && triggers.iter().any(|t| title.contains(t))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn travel_rules() -> QueryRules {
        RuleGenerator::generate("旅游", Some("旅行相关的照片和文档"))
    }

    #[test]
    fn test_generate_rules_basic() {
        let rules = travel_rules();
        assert!(rules.auto_match);
        assert_eq!(rules.match_threshold, 0.6);
        assert!(rules.keywords.iter().any(|k| k == "旅游"));
        assert!(rules.keywords.iter().any(|k| k == "旅行"));
        assert!(rules.keywords.iter().any(|k| k == "度假"));
        assert!(!rules.title_patterns.is_empty());
        assert!(rules.title_patterns.len() <= defaults::MAX_TITLE_PATTERNS);
    }

    #[test]
    fn test_generate_rules_dedups_keywords() {
        let rules = travel_rules();
        let mut seen = std::collections::HashSet::new();
        for k in &rules.keywords {
            assert!(seen.insert(k.clone()), "duplicate keyword {}", k);
        }
    }

    #[test]
    fn test_generate_meeting_content_patterns() {
        let rules = RuleGenerator::generate("会议纪要", None);
        assert!(rules.content_patterns.iter().any(|p| p == "会议时间"));
        assert!(rules.content_patterns.iter().any(|p| p == "参会人员"));
    }

    #[test]
    fn test_generate_custom_name_keeps_literal() {
        let rules = RuleGenerator::generate("Python学习资料", None);
        assert!(rules.keywords.iter().any(|k| k == "Python学习资料"));
        // Tokenization splits off the Latin and CJK runs.
        assert!(rules.keywords.iter().any(|k| k == "Python"));
        assert!(rules.keywords.iter().any(|k| k == "学习资料"));
    }

    #[test]
    fn test_tokenize_name_run_lengths() {
        assert_eq!(tokenize_name("AI笔记"), vec!["笔记"]); // "AI" too short
        assert_eq!(tokenize_name("dev周报"), vec!["dev", "周报"]);
        assert!(tokenize_name("a b").is_empty());
    }

    #[test]
    fn test_title_match_score_partial() {
        let rules = RuleGenerator::generate("旅游", None);
        let score = title_match_score("项目旅行计划.pdf", &rules);
        assert!(score >= 0.2, "score {}", score);
        let zero = title_match_score("普通文档.txt", &rules);
        assert_eq!(zero, 0.0);
    }

    #[test]
    fn test_body_match_score_saturates() {
        let rules = travel_rules();
        let text = "这次旅游旅行度假去了景点，风景很好，订了酒店和机票还有门票";
        let score = body_match_score(text, &rules);
        // Keyword component saturates at 0.6; no content patterns for travel.
        assert!((score - 0.6).abs() < 1e-6, "score {}", score);
    }

    #[test]
    fn test_body_ignores_text_beyond_window() {
        let rules = travel_rules();
        let padding: String = std::iter::repeat('甲').take(1200).collect();
        let text = format!("{}旅游度假", padding);
        assert_eq!(body_match_score(&text, &rules), 0.0);
    }

    #[test]
    fn test_parse_image_analysis_sections() {
        let text = "【文本内容】\n巴厘岛度假村\n\n【场景描述】\n美丽的海滩风景，蓝天白云\n\n【活动推理】\n旅游度假\n\n【关键元素】\n海滩,度假村,旅行,风景\n\n【情感色彩】\n轻松愉快";
        let parsed = parse_image_analysis(text);
        assert_eq!(
            parsed.scene_description.as_deref(),
            Some("美丽的海滩风景，蓝天白云")
        );
        assert_eq!(parsed.activity_inference.as_deref(), Some("旅游度假"));
        assert!(parsed.key_elements.as_deref().unwrap().contains("海滩"));
    }

    #[test]
    fn test_parse_image_analysis_absent() {
        assert!(parse_image_analysis("普通的文档内容，没有特殊格式").is_empty());
    }

    #[test]
    fn test_structured_score_caps_per_section() {
        let rules = travel_rules();
        let text = "【活动推理】\n旅游度假\n【关键元素】\n海滩,风景,度假村";
        let score = structured_match_score(text, &rules.keywords);
        // Activity hits 旅游+度假 => saturates 0.6; elements hit 风景+度假 => 0.4.
        assert!((score - 1.0).abs() < 1e-6, "score {}", score);
        assert_eq!(structured_match_score("没有结构化段落", &rules.keywords), 0.0);
    }

    #[test]
    fn test_obvious_match_override_disney_ticket() {
        // Weighted score lands between 0.3 and 0.6: below the default
        // threshold, rescued by the 迪士尼 trigger in the title.
        let rules = travel_rules();
        let title = "迪士尼乐园门票.jpg";
        let text = "这次度假去了乐园，风景不错，还订了酒店";
        let breakdown = RuleGenerator::score("旅游", &rules, title, text, Modality::Image);

        assert!(breakdown.total < rules.match_threshold, "total {}", breakdown.total);
        assert!(breakdown.obvious_trigger);
        assert_eq!(breakdown.threshold, defaults::OBVIOUS_MATCH_THRESHOLD);
        assert!(RuleGenerator::is_match(&breakdown), "total {}", breakdown.total);
    }

    #[test]
    fn test_no_trigger_means_default_threshold() {
        let rules = travel_rules();
        let breakdown = RuleGenerator::score(
            "旅游",
            &rules,
            "随手拍.jpg",
            "这次度假去了乐园，风景不错，还订了酒店",
            Modality::Image,
        );
        assert!(!breakdown.obvious_trigger);
        assert_eq!(breakdown.threshold, rules.match_threshold);
        assert!(!RuleGenerator::is_match(&breakdown));
    }

    #[test]
    fn test_structured_fields_only_score_for_images() {
        let rules = travel_rules();
        let text = "【活动推理】\n旅游度假\n【关键元素】\n海滩,风景,度假村";
        let as_image = RuleGenerator::score("旅游", &rules, "照片", text, Modality::Image);
        let as_text = RuleGenerator::score("旅游", &rules, "照片", text, Modality::Text);
        assert!(as_image.structured > 0.0);
        assert_eq!(as_text.structured, 0.0);
        assert!(as_image.total > as_text.total);
    }

    #[test]
    fn test_meeting_doc_matches_meeting_collection() {
        let rules = RuleGenerator::generate("会议纪要", None);
        let breakdown = RuleGenerator::score(
            "会议纪要",
            &rules,
            "项目会议纪要.docx",
            "会议时间：2024年10月3日，议题：项目进度讨论，决议事项：下周评审",
            Modality::Text,
        );
        // 纪要 in the title fires the 会议 trigger.
        assert!(breakdown.obvious_trigger);
        assert!(RuleGenerator::is_match(&breakdown), "total {}", breakdown.total);
    }

    #[test]
    fn test_unrelated_doc_does_not_match() {
        let rules = RuleGenerator::generate("会议纪要", None);
        let breakdown = RuleGenerator::score(
            "会议纪要",
            &rules,
            "泰国旅游照片.jpg",
            "【活动推理】\n旅游度假\n【关键元素】\n海滩,旅行,度假",
            Modality::Image,
        );
        assert!(!RuleGenerator::is_match(&breakdown));
    }
}
