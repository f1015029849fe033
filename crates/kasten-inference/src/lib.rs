//! # kasten-inference
//!
//! LLM inference backend abstraction for the kasten knowledge base.
//!
//! This crate provides:
//! - An OpenAI-compatible backend (chat completions + embeddings) with
//!   mandatory request timeouts
//! - Classification prompt construction and strict response parsing
//! - A deterministic mock backend for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use kasten_inference::{OpenAiBackend, OpenAiConfig};
//! use kasten_core::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OpenAiBackend::from_env().unwrap();
//!     let texts = vec!["Hello".to_string()];
//!     let embeddings = backend.embed_texts(&texts).await.unwrap();
//!     assert_eq!(embeddings.len(), 1);
//! }
//! ```

pub mod classify;
pub mod openai;

// Mock backend for deterministic tests. Always compiled so downstream
// crates' integration tests can use it without a feature dance.
pub mod mock;

// Re-export core types
pub use kasten_core::*;

pub use classify::{
    classification_prompt, parse_classification, ModelClassification, CLASSIFY_SYSTEM_PROMPT,
};
pub use mock::MockBackend;
pub use openai::{OpenAiBackend, OpenAiConfig};
