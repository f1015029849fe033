//! Core traits for kasten abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability. Repository traits
//! are implemented by `kasten-db`; backend traits by `kasten-inference`
//! and by external document parsers.

use async_trait::async_trait;
use pgvector::Vector;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// CONTENT REPOSITORY
// =============================================================================

/// Repository for content rows and their processing state.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Insert a new content row with pending processing state.
    async fn insert(&self, req: CreateContentRequest) -> Result<Uuid>;

    /// Fetch a content row, failing with `ContentNotFound`.
    async fn fetch(&self, id: Uuid) -> Result<Content>;

    /// Fetch a content row if it exists.
    async fn get(&self, id: Uuid) -> Result<Option<Content>>;

    /// Replace the derived text and merge origin metadata after parsing.
    async fn update_text(&self, id: Uuid, text: &str, meta: Option<JsonValue>) -> Result<()>;

    /// Correct the modality after content inspection (magic bytes beat
    /// file extensions).
    async fn set_modality(&self, id: Uuid, modality: Modality) -> Result<()>;

    /// Advance the parsing status. Regressions are refused (logged, no-op).
    async fn set_parsing_status(&self, id: Uuid, status: ParsingStatus) -> Result<()>;

    /// Advance the classification status. Regressions are refused.
    async fn set_classification_status(&self, id: Uuid, status: ClassificationStatus)
        -> Result<()>;

    /// Flip the UI visibility gate.
    async fn set_show_classification(&self, id: Uuid, show: bool) -> Result<()>;

    /// Delete a content row and its owned chunks/associations.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// List all content ids (for collection backfill).
    async fn list_all_ids(&self) -> Result<Vec<Uuid>>;
}

// =============================================================================
// CHUNK REPOSITORY
// =============================================================================

/// Repository for chunk storage and embedding backfill.
#[async_trait]
pub trait ChunkRepository: Send + Sync {
    /// Replace all chunks for a content with freshly chunked text.
    /// Returns the new chunk ids in sequence order.
    async fn replace_for_content(&self, content_id: Uuid, texts: Vec<String>) -> Result<Vec<Uuid>>;

    /// Get all chunks for a content in sequence order.
    async fn get_for_content(&self, content_id: Uuid) -> Result<Vec<Chunk>>;

    /// Fetch (id, text) pairs for specific chunks.
    async fn fetch_texts(&self, ids: &[Uuid]) -> Result<Vec<(Uuid, String)>>;

    /// Backfill embeddings for chunks. Returns the number updated.
    async fn store_embeddings(&self, embeddings: Vec<(Uuid, Vector)>) -> Result<usize>;

    /// Chunk ids of a content that still lack an embedding.
    async fn ids_missing_embedding(&self, content_id: Uuid) -> Result<Vec<Uuid>>;
}

// =============================================================================
// CATEGORY REPOSITORY
// =============================================================================

/// Repository for the category taxonomy and content-category associations.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Seed the fixed system categories idempotently.
    async fn ensure_system_categories(&self) -> Result<()>;

    /// Create a category.
    async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        color: Option<&str>,
        is_system: bool,
    ) -> Result<Uuid>;

    /// Get a category by id.
    async fn get(&self, id: Uuid) -> Result<Option<Category>>;

    /// Get a category by exact name.
    async fn get_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// List all categories.
    async fn list(&self) -> Result<Vec<Category>>;

    /// Delete a user category. System categories are refused.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Insert an association. The `(content, category)` pair is the key;
    /// re-inserting updates confidence/reasoning in place.
    async fn upsert_association(&self, assoc: &ContentCategory) -> Result<()>;

    /// Whether an association with matching reasoning already exists
    /// (idempotency key for rule matches).
    async fn association_exists(
        &self,
        content_id: Uuid,
        category_id: Uuid,
        reasoning_like: &str,
    ) -> Result<bool>;

    /// Whether the content already carries a system primary label.
    async fn has_system_primary(&self, content_id: Uuid) -> Result<bool>;

    /// The current authoritative primary label, newest first during the
    /// brief arbitration window where two primaries coexist.
    async fn primary_for_content(&self, content_id: Uuid) -> Result<Option<ContentCategory>>;

    /// All associations for a content.
    async fn associations_for_content(&self, content_id: Uuid) -> Result<Vec<ContentCategory>>;

    /// Delete every `primary_system` and `secondary_tag` row for a content.
    /// Used by model-classifier arbitration. Returns rows removed.
    async fn delete_system_labels(&self, content_id: Uuid) -> Result<u64>;
}

// =============================================================================
// COLLECTION REPOSITORY
// =============================================================================

/// Repository for user-defined collections.
#[async_trait]
pub trait CollectionRepository: Send + Sync {
    /// Create a collection backed by a category, with optional rules.
    async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        category_id: Uuid,
        query_rules: Option<&crate::collection_rules::QueryRules>,
    ) -> Result<Uuid>;

    /// Get a collection by id.
    async fn get(&self, id: Uuid) -> Result<Option<Collection>>;

    /// List user-created (non-auto-generated) collections.
    async fn list_user(&self) -> Result<Vec<Collection>>;

    /// Persist lazily generated rules.
    async fn update_rules(
        &self,
        id: Uuid,
        rules: &crate::collection_rules::QueryRules,
    ) -> Result<()>;

    /// Delete a collection, its associations, and its backing category.
    /// Contents themselves are never deleted.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// SIGNAL REPOSITORY
// =============================================================================

/// Append-only audit log of automatic decisions.
#[async_trait]
pub trait SignalRepository: Send + Sync {
    /// Record a decision. Signals are never mutated or deleted.
    async fn record(
        &self,
        content_id: Uuid,
        signal_type: SignalType,
        payload: JsonValue,
        confidence: Option<f32>,
        model_version: Option<&str>,
    ) -> Result<Uuid>;

    /// List signals for a content, newest first.
    async fn list_for_content(&self, content_id: Uuid) -> Result<Vec<Signal>>;
}

// =============================================================================
// JOB REPOSITORY
// =============================================================================

/// Repository for job queue operations.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Queue a new job, runnable no earlier than `delay_secs` from now.
    async fn queue(
        &self,
        content_id: Option<Uuid>,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
        delay_secs: i64,
    ) -> Result<Uuid>;

    /// Queue a job unless the same (content, type) is already pending or
    /// running. Returns None when deduplicated away.
    async fn queue_deduplicated(
        &self,
        content_id: Option<Uuid>,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
        delay_secs: i64,
    ) -> Result<Option<Uuid>>;

    /// Claim the next runnable job whose type is in `job_types`
    /// (empty slice = any type). Respects `run_after` and priority order.
    async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>>;

    /// Push a claimed job back to pending with a fresh delay. Used for
    /// precondition re-checks; does not consume a retry attempt.
    async fn reschedule(&self, job_id: Uuid, delay_secs: i64) -> Result<()>;

    /// Mark a job completed.
    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()>;

    /// Mark a job failed. Jobs with remaining retries are re-queued with
    /// backoff; exhausted jobs become terminal failures.
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()>;

    /// Get a job by id.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;

    /// Number of pending jobs.
    async fn pending_count(&self) -> Result<i64>;

    /// Queue statistics.
    async fn queue_stats(&self) -> Result<QueueStats>;
}

// =============================================================================
// BACKEND TRAITS
// =============================================================================

/// Result of parsing a raw document.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub text: String,
    pub metadata: JsonValue,
}

/// External document/image/PDF text extraction. Implementations may be
/// slow and must run off the hot path.
#[async_trait]
pub trait ParserBackend: Send + Sync {
    /// Extract plain text and metadata from raw bytes.
    async fn parse(&self, raw: &[u8], filename: &str) -> Result<ParsedDocument>;
}

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts, one vector per input.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Model name being used.
    fn model_name(&self) -> &str;
}
