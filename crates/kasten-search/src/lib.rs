//! # kasten-search
//!
//! Hybrid search engine for the kasten knowledge base.
//!
//! This crate provides:
//! - Query-intent inference (expected modality, dynamic similarity floor,
//!   synonym expansion)
//! - Tiered keyword matching with a whole-word-preferring relevance ladder
//! - Semantic search over pgvector chunk embeddings with
//!   modality-consistency filtering
//! - Weighted score fusion deduplicated to one hit per content
//!
//! ## Example
//!
//! ```ignore
//! use kasten_search::{HybridSearchEngine, HybridSearchConfig};
//! use kasten_core::{SearchFilters, SearchMode};
//! use kasten_db::Database;
//!
//! let db = Database::connect("postgres://...").await?;
//! let engine = HybridSearchEngine::new(db, Some(embedder));
//! let response = engine
//!     .search("机器学习", 10, SearchMode::Hybrid, SearchFilters::new())
//!     .await;
//! ```

pub mod dedup;
pub mod hybrid;
pub mod intent;
pub mod keyword;

// Re-export core types
pub use kasten_core::*;

pub use dedup::dedupe_best_per_content;
pub use hybrid::{fuse_results, HybridSearchConfig, HybridSearchEngine};
pub use intent::{expand_terms, QueryIntent};
pub use keyword::{filter_by_relevance, relevance_score, split_words};
