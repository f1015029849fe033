//! The fixed system taxonomy and the deterministic quick-scoring rules.
//!
//! Four system categories ship with the system. The quick classifier never
//! performs I/O: it scores the title plus a leading slice of body text
//! against per-category keyword, filename-pattern, and extension tables,
//! and always produces a label within milliseconds. The same keyword
//! tables back the model classifier's last-resort fallback.

use once_cell::sync::Lazy;

use crate::defaults;

/// Static definition of one system category.
#[derive(Debug, Clone)]
pub struct SystemCategorySpec {
    pub name: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    pub keywords: &'static [&'static str],
    pub file_patterns: &'static [&'static str],
    pub extensions: &'static [&'static str],
}

/// The system taxonomy, in declaration order. Declaration order doubles as
/// the tie-breaking order for equal quick scores.
pub static SYSTEM_CATEGORIES: Lazy<Vec<SystemCategorySpec>> = Lazy::new(|| {
    vec![
        SystemCategorySpec {
            name: "职场商务",
            description: "工作相关文档、商业计划、职业发展、会议记录、项目管理等",
            color: "#2196F3",
            keywords: &[
                "工作", "商务", "职场", "项目", "会议", "商业", "管理", "职业", "公司", "团队",
                "业务", "客户", "合同", "报告", "计划", "纪要", "议题", "决议", "讨论",
            ],
            file_patterns: &[
                "report", "meeting", "business", "work", "project", "plan", "minutes", "agenda",
            ],
            extensions: &[".docx", ".pptx", ".xlsx"],
        },
        SystemCategorySpec {
            name: "生活点滴",
            description: "日常生活记录、个人感悟、生活经验、旅行日记、美食分享等",
            color: "#4CAF50",
            keywords: &[
                "生活", "日常", "个人", "旅行", "美食", "感悟", "经验", "日记", "家庭", "朋友",
                "休闲", "娱乐", "购物", "健康", "风景", "自拍",
            ],
            file_patterns: &[
                "diary", "life", "travel", "food", "personal", "daily", "selfie", "vacation",
            ],
            // Image extensions intentionally absent: content decides, not the container.
            extensions: &[],
        },
        SystemCategorySpec {
            name: "学习成长",
            description: "学习笔记、技能提升、知识总结、读书心得、课程资料等",
            color: "#FF9800",
            keywords: &[
                "学习", "笔记", "知识", "技能", "成长", "教育", "课程", "读书", "培训", "考试",
                "研究", "总结", "心得", "方法", "教程",
            ],
            file_patterns: &[
                "study", "learn", "note", "course", "education", "training", "research",
                "tutorial",
            ],
            extensions: &[".md", ".txt", ".pdf"],
        },
        SystemCategorySpec {
            name: "科技前沿",
            description: "技术文档、科技资讯、创新产品、编程代码、技术趋势等",
            color: "#9C27B0",
            keywords: &[
                "技术", "科技", "编程", "代码", "创新", "产品", "趋势", "开发", "算法", "数据",
                "ai", "人工智能", "机器学习", "区块链", "架构", "系统", "api",
            ],
            file_patterns: &[
                "tech", "code", "dev", "api", "algorithm", "data", "ai", "ml", "architecture",
                "system",
            ],
            extensions: &[
                ".py", ".js", ".java", ".cpp", ".go", ".rs", ".json", ".yaml", ".yml",
            ],
        },
    ]
});

/// Name of the category assigned when no rule produces a signal.
pub const DEFAULT_CATEGORY: &str = "学习成长";

/// Accessor namespace for taxonomy lookups.
pub struct Taxonomy;

impl Taxonomy {
    /// All system category specs in declaration order.
    pub fn categories() -> &'static [SystemCategorySpec] {
        &SYSTEM_CATEGORIES
    }

    /// All system category names in declaration order.
    pub fn names() -> Vec<&'static str> {
        SYSTEM_CATEGORIES.iter().map(|c| c.name).collect()
    }

    /// Look up a spec by exact name.
    pub fn get(name: &str) -> Option<&'static SystemCategorySpec> {
        SYSTEM_CATEGORIES.iter().find(|c| c.name == name)
    }

    /// Whether `name` is an exact taxonomy member.
    pub fn contains(name: &str) -> bool {
        Self::get(name).is_some()
    }

    /// Find the taxonomy category closest to an out-of-taxonomy label by
    /// substring similarity against names, descriptions, and keyword
    /// tables. None when nothing recognizable matches.
    pub fn try_closest(label: &str) -> Option<&'static str> {
        let label_lower = label.to_lowercase();
        if label_lower.is_empty() {
            return None;
        }
        for spec in SYSTEM_CATEGORIES.iter() {
            if label_lower.contains(&spec.name.to_lowercase())
                || spec.name.to_lowercase().contains(&label_lower)
                || spec.description.contains(label_lower.as_str())
            {
                return Some(spec.name);
            }
            for keyword in spec.keywords {
                if label_lower.contains(keyword) {
                    return Some(spec.name);
                }
            }
        }
        None
    }

    /// Like [`Taxonomy::try_closest`] but falls back to the first category
    /// when nothing matches.
    pub fn closest(label: &str) -> &'static str {
        Self::try_closest(label).unwrap_or(SYSTEM_CATEGORIES[0].name)
    }
}

/// Outcome of a deterministic quick-scoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct QuickScore {
    pub category: &'static str,
    pub confidence: f32,
    pub reasoning: String,
    pub raw_score: u32,
}

/// Score the document against every system category and pick the winner.
///
/// Per category:
/// `score = 2 × keyword hits (title + first 500 chars)
///        + 1 × filename-pattern hits + 1 × extension match`.
/// Ties break by taxonomy declaration order; all-zero scores fall back to
/// the default category with low confidence.
pub fn quick_score(title: &str, text: &str, source_uri: Option<&str>) -> QuickScore {
    let scan: String = text.chars().take(defaults::QUICK_SCAN_CHARS).collect();
    let haystack = format!("{} {}", title, scan).to_lowercase();
    let extension = source_uri.and_then(file_extension);

    let mut best: Option<(u32, &'static SystemCategorySpec, Vec<String>)> = None;

    for spec in SYSTEM_CATEGORIES.iter() {
        let mut score = 0u32;
        let mut reasons = Vec::new();

        let keyword_hits = spec
            .keywords
            .iter()
            .filter(|k| haystack.contains(&k.to_lowercase()))
            .count() as u32;
        if keyword_hits > 0 {
            score += defaults::QUICK_KEYWORD_WEIGHT * keyword_hits;
            reasons.push(format!("关键词匹配({}个)", keyword_hits));
        }

        let pattern_hits = spec
            .file_patterns
            .iter()
            .filter(|p| haystack.contains(*p))
            .count() as u32;
        if pattern_hits > 0 {
            score += defaults::QUICK_PATTERN_WEIGHT * pattern_hits;
            reasons.push(format!("文件名模式匹配({}个)", pattern_hits));
        }

        if let Some(ext) = extension.as_deref() {
            if spec.extensions.contains(&ext) {
                score += defaults::QUICK_EXTENSION_WEIGHT;
                reasons.push(format!("文件类型匹配({})", ext));
            }
        }

        // Strict comparison keeps the first (declaration-order) winner on ties.
        if best.as_ref().map_or(true, |(s, _, _)| score > *s) {
            best = Some((score, spec, reasons));
        }
    }

    match best {
        Some((score, spec, reasons)) if score > 0 => {
            let confidence = (score as f32 / 10.0)
                .clamp(defaults::QUICK_CONFIDENCE_MIN, defaults::QUICK_CONFIDENCE_MAX);
            QuickScore {
                category: spec.name,
                confidence,
                reasoning: format!("基于规则匹配: {}", reasons.join(", ")),
                raw_score: score,
            }
        }
        _ => QuickScore {
            category: DEFAULT_CATEGORY,
            confidence: defaults::QUICK_CONFIDENCE_DEFAULT,
            reasoning: "无明显特征，使用默认分类".to_string(),
            raw_score: 0,
        },
    }
}

/// Occurrence-counting fallback used when the model returns garbage: counts
/// every keyword occurrence over the full title + text instead of distinct
/// hits over a leading slice.
pub fn keyword_fallback_score(title: &str, text: &str) -> QuickScore {
    let haystack = format!("{} {}", title, text).to_lowercase();

    let mut best: Option<(u32, &'static SystemCategorySpec)> = None;
    for spec in SYSTEM_CATEGORIES.iter() {
        let score: u32 = spec
            .keywords
            .iter()
            .map(|k| haystack.matches(&k.to_lowercase()).count() as u32)
            .sum();
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, spec));
        }
    }

    match best {
        Some((score, spec)) if score > 0 => QuickScore {
            category: spec.name,
            confidence: (score as f32 / 10.0).clamp(0.3, 0.8),
            reasoning: format!("基于关键词匹配，匹配到{}个相关词汇", score),
            raw_score: score,
        },
        _ => QuickScore {
            category: DEFAULT_CATEGORY,
            confidence: 0.2,
            reasoning: "无法确定分类，使用默认分类".to_string(),
            raw_score: 0,
        },
    }
}

/// Extract a lowercase `.ext` from a URI or filename.
fn file_extension(uri: &str) -> Option<String> {
    let name = uri.rsplit('/').next().unwrap_or(uri);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_names_unique_and_ordered() {
        let names = Taxonomy::names();
        assert_eq!(names.len(), 4);
        assert_eq!(names[0], "职场商务");
        let mut sorted = names.clone();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
    }

    #[test]
    fn test_meeting_minutes_scenario() {
        // A meeting-minutes document must land in 职场商务 with usable
        // confidence and keyword-match reasoning.
        let score = quick_score(
            "项目会议纪要.docx",
            "会议时间：2024年10月3日\n参会人员：张三、李四\n决议：下周完成需求评审",
            Some("webui://项目会议纪要.docx"),
        );
        assert_eq!(score.category, "职场商务");
        assert!(score.confidence >= 0.5, "confidence {}", score.confidence);
        assert!(score.reasoning.contains("关键词匹配"));
    }

    #[test]
    fn test_quick_score_no_signal_defaults() {
        let score = quick_score("random.bin", "zzzz qqqq", Some("file:///tmp/random.bin"));
        assert_eq!(score.category, DEFAULT_CATEGORY);
        assert_eq!(score.confidence, 0.3);
        assert_eq!(score.raw_score, 0);
        assert!(score.reasoning.contains("默认分类"));
    }

    #[test]
    fn test_quick_score_confidence_clamped() {
        // Many keyword hits must not push confidence past the quick ceiling.
        let text = "技术 科技 编程 代码 创新 产品 趋势 开发 算法 数据 架构 系统";
        let score = quick_score("架构设计.md", text, Some("webui://架构设计.md"));
        assert_eq!(score.category, "科技前沿");
        assert_eq!(score.confidence, 0.8);
    }

    #[test]
    fn test_quick_score_extension_only() {
        let score = quick_score("data", "", Some("file:///srv/data.yaml"));
        assert_eq!(score.category, "科技前沿");
        // A lone extension hit scores 1 -> clamped up to the floor.
        assert_eq!(score.confidence, 0.4);
        assert!(score.reasoning.contains("文件类型匹配(.yaml)"));
    }

    #[test]
    fn test_quick_score_tie_breaks_by_declaration_order() {
        // 旅行 (生活点滴) and 学习 (学习成长) both hit exactly once;
        // 生活点滴 is declared earlier and must win.
        let score = quick_score("memo", "旅行 学习", None);
        assert_eq!(score.category, "生活点滴");
    }

    #[test]
    fn test_keyword_fallback_counts_occurrences() {
        let score = keyword_fallback_score("学习笔记", "学习 学习 学习 笔记");
        assert_eq!(score.category, "学习成长");
        assert!(score.raw_score >= 4);
        assert!(score.reasoning.contains("相关词汇"));
    }

    #[test]
    fn test_keyword_fallback_empty() {
        let score = keyword_fallback_score("", "");
        assert_eq!(score.category, DEFAULT_CATEGORY);
        assert_eq!(score.confidence, 0.2);
    }

    #[test]
    fn test_closest_matches_by_keyword() {
        assert_eq!(Taxonomy::closest("编程与开发"), "科技前沿");
        assert_eq!(Taxonomy::closest("会议记录"), "职场商务");
        // Nothing recognizable falls back to the first category.
        assert_eq!(Taxonomy::closest("xyz"), "职场商务");
    }

    #[test]
    fn test_file_extension_parsing() {
        assert_eq!(file_extension("webui://报告.DOCX"), Some(".docx".into()));
        assert_eq!(file_extension("file:///a/b/c.tar.gz"), Some(".gz".into()));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension(".hidden"), None);
    }
}
