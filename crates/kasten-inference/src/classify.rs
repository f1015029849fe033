//! Classification prompt construction and response parsing.
//!
//! The model must answer with a JSON object naming one taxonomy category
//! plus optional secondary tags. Parsing is strict about shape but
//! forgiving about wrapping: code fences and prose around the JSON object
//! are tolerated. An out-of-taxonomy primary is resolved by similarity
//! against the taxonomy; an unresolvable one is an error so the caller
//! can fall back to keyword scoring.

use serde::Deserialize;

use kasten_core::{defaults, CategoryConfidence, Error, Result, Taxonomy};

/// System prompt for the classification call.
pub const CLASSIFY_SYSTEM_PROMPT: &str =
    "你是一个专业的文档分类助手。请根据文档内容进行准确分类，并返回JSON格式的结果。";

/// A validated model classification: one in-taxonomy primary label plus
/// zero or more secondary tags, confidences clipped into [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelClassification {
    pub primary: CategoryConfidence,
    pub secondary: Vec<CategoryConfidence>,
    pub reasoning: String,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    category: String,
    confidence: f32,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    secondary: Vec<RawSecondary>,
}

#[derive(Debug, Deserialize)]
struct RawSecondary {
    category: String,
    confidence: f32,
}

/// Build the classification prompt from a title and a leading excerpt.
pub fn classification_prompt(title: &str, text: &str) -> String {
    let excerpt: String = text.chars().take(defaults::CLASSIFY_EXCERPT_CHARS).collect();
    let truncated = text.chars().count() > defaults::CLASSIFY_EXCERPT_CHARS;

    let categories_desc = Taxonomy::categories()
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {} - {}", i + 1, c.name, c.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "请分析以下文档内容，将其归类到最合适的分类中。\n\n\
         可选分类：\n{categories_desc}\n\n\
         文档标题：{title}\n\n\
         文档内容：\n{excerpt}{ellipsis}\n\n\
         请返回JSON格式的结果：\n\
         {{\n\
             \"category\": \"分类名称\",\n\
             \"confidence\": 0.85,\n\
             \"reasoning\": \"分类理由（简短说明为什么选择这个分类）\",\n\
             \"secondary\": [{{\"category\": \"次要分类\", \"confidence\": 0.6}}]\n\
         }}\n\n\
         注意：\n\
         1. category必须是上述{count}个分类之一的准确名称\n\
         2. confidence是0.0到1.0之间的数值\n\
         3. secondary可以为空数组\n\
         4. reasoning简要说明分类依据",
        ellipsis = if truncated { "..." } else { "" },
        count = Taxonomy::categories().len(),
    )
}

/// Parse a raw model response into a validated classification.
pub fn parse_classification(raw: &str) -> Result<ModelClassification> {
    let json_str = extract_json_object(raw)
        .ok_or_else(|| Error::Inference("No JSON object in model response".to_string()))?;

    let parsed: RawClassification = serde_json::from_str(json_str)
        .map_err(|e| Error::Inference(format!("Unparseable classification: {}", e)))?;

    let category = resolve_category(&parsed.category)?;

    let secondary = parsed
        .secondary
        .into_iter()
        .filter_map(|s| {
            // Secondary tags that cannot be resolved are dropped, not fatal.
            Taxonomy::try_closest(&s.category)
                .or_else(|| Taxonomy::get(&s.category).map(|spec| spec.name))
                .filter(|name| *name != category)
                .map(|name| CategoryConfidence::new(name, s.confidence))
        })
        .collect();

    Ok(ModelClassification {
        primary: CategoryConfidence::new(category, parsed.confidence),
        secondary,
        reasoning: parsed.reasoning.unwrap_or_default(),
    })
}

/// Resolve a model-supplied category name against the taxonomy: exact
/// match first, then similarity.
fn resolve_category(name: &str) -> Result<&'static str> {
    if let Some(spec) = Taxonomy::get(name) {
        return Ok(spec.name);
    }
    Taxonomy::try_closest(name).ok_or_else(|| {
        Error::Inference(format!("Category '{}' not resolvable against taxonomy", name))
    })
}

/// Pull the outermost JSON object out of a response that may be wrapped
/// in code fences or prose.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_taxonomy_and_title() {
        let prompt = classification_prompt("会议纪要", "今天的会议讨论了预算");
        assert!(prompt.contains("职场商务"));
        assert!(prompt.contains("科技前沿"));
        assert!(prompt.contains("文档标题：会议纪要"));
        assert!(prompt.contains("今天的会议讨论了预算"));
    }

    #[test]
    fn test_prompt_truncates_long_text() {
        let text = "字".repeat(2000);
        let prompt = classification_prompt("t", &text);
        assert!(prompt.contains("..."));
        assert!(!prompt.contains(&"字".repeat(1500)));
    }

    #[test]
    fn test_parse_plain_json() {
        let raw = r#"{"category": "科技前沿", "confidence": 0.92, "reasoning": "技术文档"}"#;
        let result = parse_classification(raw).unwrap();
        assert_eq!(result.primary.category, "科技前沿");
        assert_eq!(result.primary.confidence, 0.92);
        assert_eq!(result.reasoning, "技术文档");
        assert!(result.secondary.is_empty());
    }

    #[test]
    fn test_parse_fenced_json_with_secondary() {
        let raw = "分类结果如下：\n```json\n{\"category\": \"职场商务\", \"confidence\": 0.8, \"reasoning\": \"会议记录\", \"secondary\": [{\"category\": \"学习成长\", \"confidence\": 0.4}]}\n```";
        let result = parse_classification(raw).unwrap();
        assert_eq!(result.primary.category, "职场商务");
        assert_eq!(result.secondary.len(), 1);
        assert_eq!(result.secondary[0].category, "学习成长");
    }

    #[test]
    fn test_parse_clips_out_of_range_confidence() {
        let raw = r#"{"category": "生活点滴", "confidence": 1.7}"#;
        let result = parse_classification(raw).unwrap();
        assert_eq!(result.primary.confidence, 1.0);
    }

    #[test]
    fn test_parse_resolves_near_miss_category() {
        // "技术" is not a taxonomy name but maps to 科技前沿 by keyword.
        let raw = r#"{"category": "技术", "confidence": 0.7}"#;
        let result = parse_classification(raw).unwrap();
        assert_eq!(result.primary.category, "科技前沿");
    }

    #[test]
    fn test_parse_rejects_unresolvable_category() {
        let raw = r#"{"category": "Quantum Basket Weaving", "confidence": 0.7}"#;
        assert!(parse_classification(raw).is_err());
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(parse_classification("I think this is about work stuff.").is_err());
        assert!(parse_classification("").is_err());
    }

    #[test]
    fn test_secondary_duplicate_of_primary_dropped() {
        let raw = r#"{"category": "职场商务", "confidence": 0.8, "secondary": [{"category": "职场商务", "confidence": 0.5}]}"#;
        let result = parse_classification(raw).unwrap();
        assert!(result.secondary.is_empty());
    }
}
