//! Embedding backfill handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use kasten_core::{
    ChunkRepository, ContentRepository, EmbeddingBackend, EventBus, JobType, ParsingStatus,
    PipelineEvent, PipelineStage,
};
use kasten_db::Database;

use crate::handler::{JobContext, JobHandler, JobResult};

/// Handler for [`JobType::Embedding`] jobs: embeds every chunk of a
/// content that does not yet carry a vector.
pub struct EmbeddingHandler {
    db: Database,
    embedder: Arc<dyn EmbeddingBackend>,
    bus: EventBus,
}

impl EmbeddingHandler {
    /// Create an embedding handler.
    pub fn new(db: Database, embedder: Arc<dyn EmbeddingBackend>, bus: EventBus) -> Self {
        Self { db, embedder, bus }
    }
}

#[async_trait]
impl JobHandler for EmbeddingHandler {
    fn job_type(&self) -> JobType {
        JobType::Embedding
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let Some(content_id) = ctx.content_id() else {
            return JobResult::Failed("Embedding job carries no content id".to_string());
        };

        let content = match self.db.contents.fetch(content_id).await {
            Ok(content) => content,
            Err(e) => return JobResult::Failed(e.to_string()),
        };

        // Chunks only exist once parsing has finished.
        if matches!(
            content.state.parsing_status,
            ParsingStatus::Pending | ParsingStatus::Parsing
        ) {
            return JobResult::Retry(format!(
                "parsing_status={}",
                content.state.parsing_status.as_str()
            ));
        }

        let pending_ids = match self.db.chunks.ids_missing_embedding(content_id).await {
            Ok(ids) => ids,
            Err(e) => return JobResult::Failed(e.to_string()),
        };
        if pending_ids.is_empty() {
            return JobResult::Success(Some(json!({ "embedded": 0 })));
        }

        let pairs = match self.db.chunks.fetch_texts(&pending_ids).await {
            Ok(pairs) => pairs,
            Err(e) => return JobResult::Failed(e.to_string()),
        };
        let (ids, texts): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();

        let vectors = match self.embedder.embed_texts(&texts).await {
            Ok(vectors) => vectors,
            Err(e) => return JobResult::Failed(e.to_string()),
        };
        if vectors.len() != ids.len() {
            return JobResult::Failed(format!(
                "Embedding count mismatch: {} texts, {} vectors",
                ids.len(),
                vectors.len()
            ));
        }

        let embedded = match self
            .db
            .chunks
            .store_embeddings(ids.into_iter().zip(vectors).collect())
            .await
        {
            Ok(n) => n,
            Err(e) => return JobResult::Failed(e.to_string()),
        };

        self.bus.publish(PipelineEvent::StageCompleted {
            content_id,
            stage: PipelineStage::Embedding,
        });

        info!(
            content_id = %content_id,
            chunk_count = embedded,
            model = self.embedder.model_name(),
            "Embedded chunks"
        );

        JobResult::Success(Some(json!({ "embedded": embedded })))
    }
}
