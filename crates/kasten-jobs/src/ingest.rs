//! Ingestion service.
//!
//! Creates the content row and schedules the pipeline stages in order but
//! with deliberate delays: embedding and quick classification run
//! immediately, the model classifier after a delay so the provisional
//! label is visible first, and the collection-match safety net after
//! classification has had time to settle. File parsing itself runs as a
//! background job since parsers may be slow.

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use kasten_core::{
    ChunkRepository, ContentRepository, CreateContentRequest, EventBus, JobRepository, JobType,
    Modality, ParsingStatus, PipelineEvent, PipelineStage, Result,
};
use kasten_db::{Database, LineChunker};

use crate::config::PipelineConfig;

/// Ingestion entry points for text memos and files.
#[derive(Clone)]
pub struct IngestService {
    db: Database,
    config: PipelineConfig,
    bus: EventBus,
}

impl IngestService {
    /// Create an ingest service.
    pub fn new(db: Database, config: PipelineConfig, bus: EventBus) -> Self {
        Self { db, config, bus }
    }

    /// Ingest a plain-text memo. The text is already its own parse
    /// result, so parsing completes inline and the quick label is
    /// display-eligible immediately.
    pub async fn ingest_text(
        &self,
        title: &str,
        text: &str,
        created_by: &str,
    ) -> Result<Uuid> {
        let content_id = self
            .db
            .contents
            .insert(CreateContentRequest {
                title: title.to_string(),
                text: text.to_string(),
                modality: Modality::Text,
                source_uri: Some(format!("memo://{}", title)),
                created_by: created_by.to_string(),
                meta: None,
            })
            .await?;

        self.db
            .contents
            .set_parsing_status(content_id, ParsingStatus::Completed)
            .await?;

        let chunks = LineChunker::new().chunk(text);
        let chunk_count = chunks.len();
        self.db.chunks.replace_for_content(content_id, chunks).await?;

        self.bus.publish(PipelineEvent::StageCompleted {
            content_id,
            stage: PipelineStage::Parsing,
        });

        self.schedule_pipeline(content_id, true).await?;

        info!(
            content_id = %content_id,
            chunk_count,
            "Ingested text memo"
        );
        Ok(content_id)
    }

    /// Ingest a file by path. The content row is created immediately with
    /// pending parsing state; extraction runs as a background job.
    pub async fn ingest_file(&self, path: &str) -> Result<Uuid> {
        let filename = path.rsplit('/').next().unwrap_or(path).to_string();
        let modality = detect_modality(&filename, None);

        let content_id = self
            .db
            .contents
            .insert(CreateContentRequest {
                title: filename.clone(),
                text: String::new(),
                modality,
                source_uri: Some(format!("file://{}", path)),
                created_by: "ingest.file".to_string(),
                meta: Some(json!({ "filename": filename })),
            })
            .await?;

        self.db
            .jobs
            .queue(
                Some(content_id),
                JobType::Ingest,
                JobType::Ingest.default_priority(),
                Some(json!({ "path": path })),
                0,
            )
            .await?;

        info!(content_id = %content_id, path, "Queued file for ingestion");
        Ok(content_id)
    }

    /// Schedule the downstream stages for a content whose text is (or
    /// will shortly be) available. `display_eligible` marks ingests where
    /// the quick label may be shown immediately.
    pub async fn schedule_pipeline(&self, content_id: Uuid, display_eligible: bool) -> Result<()> {
        self.db
            .jobs
            .queue(
                Some(content_id),
                JobType::Embedding,
                JobType::Embedding.default_priority(),
                None,
                0,
            )
            .await?;

        self.db
            .jobs
            .queue(
                Some(content_id),
                JobType::QuickClassify,
                JobType::QuickClassify.default_priority(),
                Some(json!({ "update_display": display_eligible })),
                0,
            )
            .await?;

        self.db
            .jobs
            .queue(
                Some(content_id),
                JobType::ModelClassify,
                JobType::ModelClassify.default_priority(),
                None,
                self.config.model_classify_delay_secs,
            )
            .await?;

        // Safety net only: the model-classify handler enqueues matching
        // directly on completion, and handlers are idempotent.
        self.db
            .jobs
            .queue_deduplicated(
                Some(content_id),
                JobType::CollectionMatch,
                JobType::CollectionMatch.default_priority(),
                None,
                self.config.collection_match_delay_secs,
            )
            .await?;

        Ok(())
    }
}

/// Guess a modality from the filename extension, refined by magic bytes
/// when raw content is available.
pub fn detect_modality(filename: &str, raw: Option<&[u8]>) -> Modality {
    if let Some(bytes) = raw {
        if let Some(kind) = infer::get(bytes) {
            let mime = kind.mime_type();
            if mime.starts_with("image/") {
                return Modality::Image;
            }
            if mime == "application/pdf" {
                return Modality::Pdf;
            }
        }
    }

    let extension = filename
        .rsplit('.')
        .next()
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "heic" => Modality::Image,
        "pdf" => Modality::Pdf,
        _ => Modality::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_modality_by_extension() {
        assert_eq!(detect_modality("照片.JPG", None), Modality::Image);
        assert_eq!(detect_modality("报告.pdf", None), Modality::Pdf);
        assert_eq!(detect_modality("笔记.md", None), Modality::Text);
        assert_eq!(detect_modality("no_extension", None), Modality::Text);
    }

    #[test]
    fn test_detect_modality_magic_bytes_beat_extension() {
        // PNG header with a lying extension.
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        assert_eq!(detect_modality("data.txt", Some(&png)), Modality::Image);

        let pdf = b"%PDF-1.7\n";
        assert_eq!(detect_modality("data.txt", Some(pdf)), Modality::Pdf);
    }
}
