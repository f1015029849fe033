//! Centralized default constants for the kasten system.
//!
//! **This module is the single source of truth** for all shared default
//! values. The other crates reference these constants instead of defining
//! their own magic numbers.

// =============================================================================
// CHUNKING
// =============================================================================

/// Soft maximum characters per chunk. Lines are accumulated until the
/// buffer would exceed this cap, then flushed.
pub const CHUNK_SOFT_CAP: usize = 700;

// =============================================================================
// QUICK CLASSIFIER
// =============================================================================

/// Characters of body text the quick classifier inspects.
pub const QUICK_SCAN_CHARS: usize = 500;

/// Score contribution per keyword hit.
pub const QUICK_KEYWORD_WEIGHT: u32 = 2;

/// Score contribution per filename-pattern hit.
pub const QUICK_PATTERN_WEIGHT: u32 = 1;

/// Score contribution for a file-extension match.
pub const QUICK_EXTENSION_WEIGHT: u32 = 1;

/// Lower bound of the quick-classifier confidence clamp.
pub const QUICK_CONFIDENCE_MIN: f32 = 0.4;

/// Upper bound of the quick-classifier confidence clamp.
pub const QUICK_CONFIDENCE_MAX: f32 = 0.8;

/// Confidence assigned when no rule produced a signal.
pub const QUICK_CONFIDENCE_DEFAULT: f32 = 0.3;

// =============================================================================
// MODEL CLASSIFIER
// =============================================================================

/// Characters of body text included in the classification prompt.
pub const CLASSIFY_EXCERPT_CHARS: usize = 1000;

/// Timeout for the external classification call in seconds.
pub const CLASSIFY_TIMEOUT_SECS: u64 = 30;

/// Confidence recorded for collection rule matches.
pub const RULE_MATCH_CONFIDENCE: f32 = 0.8;

// =============================================================================
// COLLECTION MATCHING
// =============================================================================

/// Default match threshold persisted into generated query rules.
pub const MATCH_THRESHOLD: f32 = 0.6;

/// Effective threshold when an obvious-match trigger fires.
pub const OBVIOUS_MATCH_THRESHOLD: f32 = 0.3;

/// Characters of body text the matcher inspects.
pub const MATCH_BODY_CHARS: usize = 1000;

/// Maximum generated title patterns per collection.
pub const MAX_TITLE_PATTERNS: usize = 5;

// =============================================================================
// SEARCH
// =============================================================================

/// Default number of hits returned by search.
pub const SEARCH_TOP_K: usize = 10;

/// Keyword score weight in hybrid fusion.
pub const FUSION_KEYWORD_WEIGHT: f32 = 0.6;

/// Semantic score weight in hybrid fusion.
pub const FUSION_SEMANTIC_WEIGHT: f32 = 0.4;

/// Maximum cosine distance for semantic candidates.
pub const SEMANTIC_MAX_DISTANCE: f32 = 0.8;

/// Minimum similarity for general queries.
pub const SIMILARITY_FLOOR_DEFAULT: f32 = 0.25;

/// Minimum similarity for technical-term queries.
pub const SIMILARITY_FLOOR_TECHNICAL: f32 = 0.28;

/// Minimum similarity for image-seeking queries.
pub const SIMILARITY_FLOOR_IMAGE: f32 = 0.35;

/// Similarity above which a modality mismatch is tolerated.
pub const CROSS_MODALITY_SIMILARITY: f32 = 0.40;

/// Similarity required for a text hit against an image-seeking query.
pub const IMAGE_EXPECTED_TEXT_SIMILARITY: f32 = 0.45;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding vector dimension (text-embedding-3-small).
pub const EMBED_DIMENSION: usize = 1536;

/// Timeout for embedding requests in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Default maximum retry count for failed jobs.
pub const JOB_MAX_RETRIES: i32 = 3;

/// Default job worker poll interval in milliseconds. The worker is woken
/// through a notify handle on queue inserts; polling is a safety net for
/// delayed jobs becoming runnable and for crash recovery.
pub const JOB_POLL_INTERVAL_MS: u64 = 1000;

/// Default maximum concurrent jobs per worker.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Default job execution timeout in seconds.
pub const JOB_TIMEOUT_SECS: u64 = 120;

/// Delay before re-checking an unmet stage precondition, in seconds.
pub const PRECONDITION_RETRY_DELAY_SECS: i64 = 5;

/// Delay before the model classifier runs, in seconds. Gives the quick
/// classifier time to surface a provisional label first.
pub const MODEL_CLASSIFY_DELAY_SECS: i64 = 30;

/// Delay before the scheduled collection-match safety net runs, in seconds.
/// The model-classify stage also enqueues matching directly on completion.
pub const COLLECTION_MATCH_DELAY_SECS: i64 = 60;

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;
