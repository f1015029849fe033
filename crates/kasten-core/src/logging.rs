//! Structured logging field name constants for kasten.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (hits, chunks) |

/// Subsystem originating the log event.
/// Values: "search", "db", "inference", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "search", "quick_classify", "classify", "match_collections"
pub const OPERATION: &str = "op";

/// Content UUID being operated on.
pub const CONTENT_ID: &str = "content_id";

/// Collection UUID being operated on.
pub const COLLECTION_ID: &str = "collection_id";

/// Category name involved in a decision.
pub const CATEGORY: &str = "category";

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Job type enum variant.
pub const JOB_TYPE: &str = "job_type";

/// Search query text.
pub const QUERY: &str = "query";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search or query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of chunks processed (embedding, chunking).
pub const CHUNK_COUNT: &str = "chunk_count";

/// Number of keyword candidates before fusion.
pub const KEYWORD_HITS: &str = "keyword_hits";

/// Number of semantic candidates before fusion.
pub const SEMANTIC_HITS: &str = "semantic_hits";

/// Classification confidence for a decision.
pub const CONFIDENCE: &str = "confidence";

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
