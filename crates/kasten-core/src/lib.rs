//! # kasten-core
//!
//! Core types, traits, and abstractions for the kasten knowledge base.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other kasten crates depend on: the content/category domain model,
//! the processing state machine, the system taxonomy, collection matching
//! rules, pipeline events, and repository/backend traits.

pub mod collection_rules;
pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod search;
pub mod taxonomy;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use pgvector::Vector;

pub use collection_rules::{MatchBreakdown, QueryRules, RuleGenerator};
pub use error::{Error, Result};
pub use events::{EventBus, PipelineEvent, PipelineStage};
pub use models::*;
pub use search::*;
pub use taxonomy::{QuickScore, SystemCategorySpec, Taxonomy};
pub use traits::*;
pub use uuid_utils::new_v7;
