//! File ingestion handler: parse, chunk, and schedule downstream stages.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info};

use kasten_core::{
    ChunkRepository, ContentRepository, EventBus, JobType, ParserBackend, ParsingStatus,
    PipelineEvent, PipelineStage,
};
use kasten_db::{compute_content_hash, Database, LineChunker};

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::ingest::{detect_modality, IngestService};

/// Handler for [`JobType::Ingest`] jobs.
pub struct IngestHandler {
    db: Database,
    parser: Arc<dyn ParserBackend>,
    ingest: IngestService,
    bus: EventBus,
}

impl IngestHandler {
    /// Create an ingest handler.
    pub fn new(
        db: Database,
        parser: Arc<dyn ParserBackend>,
        ingest: IngestService,
        bus: EventBus,
    ) -> Self {
        Self {
            db,
            parser,
            ingest,
            bus,
        }
    }

    async fn mark_parse_error(&self, content_id: uuid::Uuid, error: &str) {
        if let Err(e) = self
            .db
            .contents
            .set_parsing_status(content_id, ParsingStatus::Error)
            .await
        {
            error!(content_id = %content_id, error = %e, "Failed to record parse error status");
        }
        self.bus.publish(PipelineEvent::StageFailed {
            content_id,
            stage: PipelineStage::Parsing,
            error: error.to_string(),
        });
    }
}

#[async_trait]
impl JobHandler for IngestHandler {
    fn job_type(&self) -> JobType {
        JobType::Ingest
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let Some(content_id) = ctx.content_id() else {
            return JobResult::Failed("Ingest job carries no content id".to_string());
        };
        let Some(path) = ctx.payload_str("path").map(String::from) else {
            return JobResult::Failed("Ingest job carries no path".to_string());
        };

        let content = match self.db.contents.fetch(content_id).await {
            Ok(content) => content,
            Err(e) => return JobResult::Failed(e.to_string()),
        };

        // At-least-once delivery: a redelivered job for parsed content is
        // a no-op.
        if content.state.parsing_status == ParsingStatus::Completed {
            return JobResult::Success(Some(json!({ "status": "already_parsed" })));
        }

        if let Err(e) = self
            .db
            .contents
            .set_parsing_status(content_id, ParsingStatus::Parsing)
            .await
        {
            return JobResult::Failed(e.to_string());
        }

        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                let msg = format!("Cannot read {}: {}", path, e);
                self.mark_parse_error(content_id, &msg).await;
                return JobResult::Failed(msg);
            }
        };

        let filename = path.rsplit('/').next().unwrap_or(&path);
        let parsed = match self.parser.parse(&raw, filename).await {
            Ok(parsed) => parsed,
            Err(e) => {
                let msg = format!("Parse failed for {}: {}", filename, e);
                self.mark_parse_error(content_id, &msg).await;
                return JobResult::Failed(msg);
            }
        };

        if parsed.text.trim().is_empty() {
            let msg = format!("No text content extracted from {}", filename);
            self.mark_parse_error(content_id, &msg).await;
            return JobResult::Failed(msg);
        }

        let mut meta = parsed.metadata;
        if let Some(map) = meta.as_object_mut() {
            map.insert("content_hash".into(), json!(compute_content_hash(&raw)));
        }

        if let Err(e) = self
            .db
            .contents
            .update_text(content_id, &parsed.text, Some(meta))
            .await
        {
            return JobResult::Failed(e.to_string());
        }

        // Magic bytes beat the extension guess made at enqueue time.
        let modality = detect_modality(filename, Some(&raw));
        if modality != content.modality {
            if let Err(e) = self.db.contents.set_modality(content_id, modality).await {
                return JobResult::Failed(e.to_string());
            }
        }

        let chunks = LineChunker::new().chunk(&parsed.text);
        let chunk_count = chunks.len();
        if let Err(e) = self.db.chunks.replace_for_content(content_id, chunks).await {
            return JobResult::Failed(e.to_string());
        }

        if let Err(e) = self
            .db
            .contents
            .set_parsing_status(content_id, ParsingStatus::Completed)
            .await
        {
            return JobResult::Failed(e.to_string());
        }

        self.bus.publish(PipelineEvent::StageCompleted {
            content_id,
            stage: PipelineStage::Parsing,
        });

        // File uploads are not display-eligible: the quick label stays
        // hidden until the model classifier settles it.
        if let Err(e) = self.ingest.schedule_pipeline(content_id, false).await {
            return JobResult::Failed(e.to_string());
        }

        info!(
            content_id = %content_id,
            chunk_count,
            text_len = parsed.text.len(),
            "File ingested"
        );

        JobResult::Success(Some(json!({
            "chunks_created": chunk_count,
            "text_length": parsed.text.len(),
        })))
    }
}
