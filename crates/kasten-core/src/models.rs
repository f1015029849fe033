//! Core data models for the kasten knowledge base.
//!
//! These types are shared across all kasten crates and represent the
//! domain entities: ingested content, text chunks, the category taxonomy,
//! content-category associations, user collections, audit signals, and
//! background jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// CONTENT TYPES
// =============================================================================

/// Modality of an ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Pdf,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Pdf => "pdf",
        }
    }

    /// Parse a modality string; unknown values fall back to text.
    pub fn parse(s: &str) -> Self {
        match s {
            "image" => Modality::Image,
            "pdf" => Modality::Pdf,
            _ => Modality::Text,
        }
    }
}

/// Parsing status of a content row. Transitions are monotonic forward;
/// `Error` is terminal for this field only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParsingStatus {
    Pending,
    Parsing,
    Completed,
    Error,
}

impl ParsingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParsingStatus::Pending => "pending",
            ParsingStatus::Parsing => "parsing",
            ParsingStatus::Completed => "completed",
            ParsingStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "parsing" => ParsingStatus::Parsing,
            "completed" => ParsingStatus::Completed,
            "error" => ParsingStatus::Error,
            _ => ParsingStatus::Pending,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ParsingStatus::Pending => 0,
            ParsingStatus::Parsing => 1,
            ParsingStatus::Completed => 2,
            ParsingStatus::Error => 3,
        }
    }

    /// Whether moving to `next` is a legal forward transition.
    /// `Error` and `Completed` are terminal; everything else only advances.
    pub fn can_advance_to(&self, next: ParsingStatus) -> bool {
        match self {
            ParsingStatus::Completed | ParsingStatus::Error => false,
            _ => next.rank() > self.rank(),
        }
    }
}

/// Classification status of a content row. Transitions are monotonic
/// forward; `Error` is terminal for this field only and never blocks
/// the parsing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationStatus {
    Pending,
    QuickProcessing,
    QuickDone,
    AiProcessing,
    Completed,
    Error,
}

impl ClassificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationStatus::Pending => "pending",
            ClassificationStatus::QuickProcessing => "quick_processing",
            ClassificationStatus::QuickDone => "quick_done",
            ClassificationStatus::AiProcessing => "ai_processing",
            ClassificationStatus::Completed => "completed",
            ClassificationStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "quick_processing" => ClassificationStatus::QuickProcessing,
            "quick_done" => ClassificationStatus::QuickDone,
            "ai_processing" => ClassificationStatus::AiProcessing,
            "completed" => ClassificationStatus::Completed,
            "error" => ClassificationStatus::Error,
            _ => ClassificationStatus::Pending,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ClassificationStatus::Pending => 0,
            ClassificationStatus::QuickProcessing => 1,
            ClassificationStatus::QuickDone => 2,
            ClassificationStatus::AiProcessing => 3,
            ClassificationStatus::Completed => 4,
            ClassificationStatus::Error => 5,
        }
    }

    /// Whether moving to `next` is a legal forward transition.
    pub fn can_advance_to(&self, next: ClassificationStatus) -> bool {
        match self {
            ClassificationStatus::Completed | ClassificationStatus::Error => false,
            _ => next.rank() > self.rank(),
        }
    }
}

/// Typed processing state attached to a content row.
///
/// The two status fields are independent: a parse error does not block
/// classification of whatever text is already present, and vice versa.
/// `show_classification` gates UI visibility separately from label
/// existence: it stays false while only a provisional label exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessingState {
    pub parsing_status: ParsingStatus,
    pub classification_status: ClassificationStatus,
    pub show_classification: bool,
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self {
            parsing_status: ParsingStatus::Pending,
            classification_status: ClassificationStatus::Pending,
            show_classification: false,
        }
    }
}

/// One ingested document or image and its derived text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: Uuid,
    pub title: String,
    /// Plain text, possibly empty until parsing completes.
    pub text: String,
    pub modality: Modality,
    pub source_uri: Option<String>,
    pub created_by: String,
    pub state: ProcessingState,
    /// Origin metadata (filename, content hash, parser details). Never
    /// used to carry processing state.
    pub meta: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request for creating a content row at ingestion time.
#[derive(Debug, Clone)]
pub struct CreateContentRequest {
    pub title: String,
    pub text: String,
    pub modality: Modality,
    pub source_uri: Option<String>,
    pub created_by: String,
    pub meta: Option<JsonValue>,
}

/// A bounded slice of a content's text; unit of embedding and lexical
/// matching. Immutable after creation except for embedding backfill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub content_id: Uuid,
    pub seq: i32,
    pub text: String,
    pub char_count: i32,
    /// Set once the embedding job has run; None until then.
    #[serde(skip)]
    pub embedding: Option<pgvector::Vector>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// CATEGORY TYPES
// =============================================================================

/// A taxonomy entry. System categories are the fixed classification
/// targets; user categories back user-defined collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

/// Role of a content-category association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryRole {
    /// The single authoritative system label.
    PrimarySystem,
    /// Additional weaker-confidence model tag.
    SecondaryTag,
    /// Collection rule match.
    UserRule,
}

impl CategoryRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryRole::PrimarySystem => "primary_system",
            CategoryRole::SecondaryTag => "secondary_tag",
            CategoryRole::UserRule => "user_rule",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "secondary_tag" => CategoryRole::SecondaryTag,
            "user_rule" => CategoryRole::UserRule,
            _ => CategoryRole::PrimarySystem,
        }
    }
}

/// Provenance of a content-category association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationSource {
    /// External model classification.
    Ml,
    /// Collection rule match.
    Rule,
    /// Quick keyword-scoring classification.
    Heuristic,
    /// Explicit user action.
    Manual,
}

impl ClassificationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationSource::Ml => "ml",
            ClassificationSource::Rule => "rule",
            ClassificationSource::Heuristic => "heuristic",
            ClassificationSource::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "rule" => ClassificationSource::Rule,
            "heuristic" => ClassificationSource::Heuristic,
            "manual" => ClassificationSource::Manual,
            _ => ClassificationSource::Ml,
        }
    }
}

/// Association between a content and a category, with confidence and
/// provenance. At most one `PrimarySystem` row is authoritative per
/// content once arbitration settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentCategory {
    pub content_id: Uuid,
    pub category_id: Uuid,
    pub confidence: f32,
    pub reasoning: Option<String>,
    pub role: CategoryRole,
    pub source: ClassificationSource,
    pub created_at: DateTime<Utc>,
}

/// A category name with a classification confidence, validated and clipped
/// into [0, 1] at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfidence {
    pub category: String,
    pub confidence: f32,
}

impl CategoryConfidence {
    /// Build a confidence entry, clipping the value into [0, 1].
    /// Non-finite values collapse to 0.
    pub fn new(category: impl Into<String>, confidence: f32) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            category: category.into(),
            confidence,
        }
    }
}

// =============================================================================
// COLLECTION TYPES
// =============================================================================

/// A user-visible grouping backed by exactly one category, carrying
/// generated auto-match rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub auto_generated: bool,
    /// Generated matching rules; None until rules are generated.
    pub query_rules: Option<crate::collection_rules::QueryRules>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// SIGNAL TYPES
// =============================================================================

/// Kind of audited decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Classification,
    CollectionMatch,
    Search,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Classification => "classification",
            SignalType::CollectionMatch => "collection_match",
            SignalType::Search => "search",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "collection_match" => SignalType::CollectionMatch,
            "search" => SignalType::Search,
            _ => SignalType::Classification,
        }
    }
}

/// Append-only audit record of an automatic decision. Never mutated
/// or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub content_id: Uuid,
    pub signal_type: SignalType,
    pub payload: JsonValue,
    pub confidence: Option<f32>,
    pub model_version: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// JOB TYPES
// =============================================================================

/// Status of a job in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Type of job to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Parse raw bytes into text and re-chunk
    Ingest,
    /// Generate chunk embeddings
    Embedding,
    /// Heuristic pre-classification
    QuickClassify,
    /// Model-backed authoritative classification
    ModelClassify,
    /// Recompute collection membership
    CollectionMatch,
}

impl JobType {
    /// Default priority for this job type (higher = more urgent).
    /// Mirrors the urgency classes of the queue design: immediate
    /// classification, background classification, heavy computation,
    /// bulk ingestion.
    pub fn default_priority(&self) -> i32 {
        match self {
            JobType::QuickClassify => 9,
            JobType::CollectionMatch => 8,
            JobType::Ingest => 6,
            JobType::ModelClassify => 5,
            JobType::Embedding => 3,
        }
    }
}

/// A job in the processing queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub content_id: Option<Uuid>,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: i32,
    pub payload: Option<JsonValue>,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    /// Run no earlier than this instant.
    pub run_after: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Queue statistics summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
}

/// Per-item outcome summary for batch operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl BatchOutcome {
    pub fn record_ok(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_err(&mut self, err: impl Into<String>) {
        self.failed += 1;
        self.errors.push(err.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsing_status_roundtrip() {
        for s in [
            ParsingStatus::Pending,
            ParsingStatus::Parsing,
            ParsingStatus::Completed,
            ParsingStatus::Error,
        ] {
            assert_eq!(ParsingStatus::parse(s.as_str()), s);
        }
    }

    #[test]
    fn test_parsing_status_forward_only() {
        assert!(ParsingStatus::Pending.can_advance_to(ParsingStatus::Parsing));
        assert!(ParsingStatus::Parsing.can_advance_to(ParsingStatus::Completed));
        assert!(ParsingStatus::Parsing.can_advance_to(ParsingStatus::Error));
        assert!(!ParsingStatus::Completed.can_advance_to(ParsingStatus::Parsing));
        assert!(!ParsingStatus::Error.can_advance_to(ParsingStatus::Completed));
        assert!(!ParsingStatus::Parsing.can_advance_to(ParsingStatus::Pending));
    }

    #[test]
    fn test_classification_status_roundtrip() {
        for s in [
            ClassificationStatus::Pending,
            ClassificationStatus::QuickProcessing,
            ClassificationStatus::QuickDone,
            ClassificationStatus::AiProcessing,
            ClassificationStatus::Completed,
            ClassificationStatus::Error,
        ] {
            assert_eq!(ClassificationStatus::parse(s.as_str()), s);
        }
    }

    #[test]
    fn test_classification_status_forward_only() {
        assert!(
            ClassificationStatus::Pending.can_advance_to(ClassificationStatus::QuickProcessing)
        );
        assert!(ClassificationStatus::QuickDone.can_advance_to(ClassificationStatus::AiProcessing));
        // Quick stage may be skipped entirely for re-classification calls.
        assert!(ClassificationStatus::Pending.can_advance_to(ClassificationStatus::AiProcessing));
        assert!(!ClassificationStatus::Completed.can_advance_to(ClassificationStatus::Error));
        assert!(!ClassificationStatus::Error.can_advance_to(ClassificationStatus::Completed));
        assert!(
            !ClassificationStatus::AiProcessing.can_advance_to(ClassificationStatus::QuickDone)
        );
    }

    #[test]
    fn test_processing_state_default() {
        let state = ProcessingState::default();
        assert_eq!(state.parsing_status, ParsingStatus::Pending);
        assert_eq!(state.classification_status, ClassificationStatus::Pending);
        assert!(!state.show_classification);
    }

    #[test]
    fn test_category_confidence_clipping() {
        assert_eq!(CategoryConfidence::new("a", 1.5).confidence, 1.0);
        assert_eq!(CategoryConfidence::new("a", -0.2).confidence, 0.0);
        assert_eq!(CategoryConfidence::new("a", 0.85).confidence, 0.85);
        assert_eq!(CategoryConfidence::new("a", f32::NAN).confidence, 0.0);
        assert_eq!(CategoryConfidence::new("a", f32::INFINITY).confidence, 0.0);
    }

    #[test]
    fn test_role_source_roundtrip() {
        for r in [
            CategoryRole::PrimarySystem,
            CategoryRole::SecondaryTag,
            CategoryRole::UserRule,
        ] {
            assert_eq!(CategoryRole::parse(r.as_str()), r);
        }
        for s in [
            ClassificationSource::Ml,
            ClassificationSource::Rule,
            ClassificationSource::Heuristic,
            ClassificationSource::Manual,
        ] {
            assert_eq!(ClassificationSource::parse(s.as_str()), s);
        }
    }

    #[test]
    fn test_modality_parse_fallback() {
        assert_eq!(Modality::parse("image"), Modality::Image);
        assert_eq!(Modality::parse("pdf"), Modality::Pdf);
        assert_eq!(Modality::parse("voice"), Modality::Text);
    }

    #[test]
    fn test_job_type_priorities() {
        // Quick classification must outrank the model stage so the UI gets
        // a provisional label first.
        assert!(JobType::QuickClassify.default_priority() > JobType::ModelClassify.default_priority());
        assert!(JobType::CollectionMatch.default_priority() > JobType::Embedding.default_priority());
    }

    #[test]
    fn test_batch_outcome_counts() {
        let mut outcome = BatchOutcome::default();
        outcome.record_ok();
        outcome.record_ok();
        outcome.record_err("boom");
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.errors, vec!["boom".to_string()]);
    }
}
