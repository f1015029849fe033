//! # kasten-jobs
//!
//! Background job pipeline for the kasten knowledge base.
//!
//! This crate provides:
//! - A priority job worker with per-job delay, at-least-once delivery,
//!   and precondition re-check scheduling
//! - The pipeline services: ingestion, quick classification, model
//!   classification, and collection matching
//! - One job handler per pipeline stage
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use kasten_jobs::{build_worker, IngestService, PipelineConfig, WorkerConfig};
//! use kasten_core::EventBus;
//! use kasten_db::Database;
//! use kasten_inference::OpenAiBackend;
//!
//! let db = Database::connect("postgres://...").await?;
//! let backend = Arc::new(OpenAiBackend::from_env()?);
//! let bus = EventBus::new();
//!
//! let worker = build_worker(
//!     db.clone(),
//!     parser,
//!     backend.clone(),
//!     backend,
//!     PipelineConfig::from_env(),
//!     WorkerConfig::from_env(),
//!     bus.clone(),
//! )
//! .await;
//! let handle = worker.start();
//!
//! let ingest = IngestService::new(db, PipelineConfig::from_env(), bus);
//! ingest.ingest_text("备忘", "今天的会议纪要……", "api").await?;
//! ```

pub mod classify;
pub mod config;
pub mod handler;
pub mod handlers;
pub mod ingest;
pub mod matcher;
pub mod quick;
pub mod worker;

// Re-export core types
pub use kasten_core::*;

pub use classify::{ClassificationOutcome, ClassificationService};
pub use config::PipelineConfig;
pub use handler::{JobContext, JobHandler, JobResult};
pub use handlers::{
    CollectionMatchHandler, EmbeddingHandler, IngestHandler, ModelClassifyHandler,
    QuickClassifyHandler,
};
pub use ingest::{detect_modality, IngestService};
pub use matcher::{CollectionMatcher, CreatedCollection};
pub use quick::{QuickClassifier, QuickOutcome};
pub use worker::{JobWorker, WorkerConfig, WorkerEvent, WorkerHandle};

use std::sync::Arc;

use kasten_db::Database;

/// Build a worker with every pipeline stage handler registered.
pub async fn build_worker(
    db: Database,
    parser: Arc<dyn ParserBackend>,
    embedder: Arc<dyn EmbeddingBackend>,
    generator: Arc<dyn GenerationBackend>,
    pipeline_config: PipelineConfig,
    worker_config: WorkerConfig,
    bus: EventBus,
) -> JobWorker {
    let worker = JobWorker::new(db.clone(), worker_config);

    let ingest = IngestService::new(db.clone(), pipeline_config, bus.clone());
    worker
        .register_handler(IngestHandler::new(
            db.clone(),
            parser,
            ingest,
            bus.clone(),
        ))
        .await;
    worker
        .register_handler(EmbeddingHandler::new(db.clone(), embedder, bus.clone()))
        .await;
    worker
        .register_handler(QuickClassifyHandler::new(QuickClassifier::new(
            db.clone(),
            bus.clone(),
        )))
        .await;
    worker
        .register_handler(ModelClassifyHandler::new(
            db.clone(),
            ClassificationService::new(db.clone(), generator, bus.clone()),
        ))
        .await;
    worker
        .register_handler(CollectionMatchHandler::new(
            db.clone(),
            CollectionMatcher::new(db, bus),
        ))
        .await;

    worker
}
