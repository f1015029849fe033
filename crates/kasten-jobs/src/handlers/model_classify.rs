//! Model classification handler.

use async_trait::async_trait;
use serde_json::json;

use kasten_core::{JobRepository, JobType};
use kasten_db::Database;

use crate::classify::{ClassificationOutcome, ClassificationService};
use crate::handler::{JobContext, JobHandler, JobResult};

/// Handler for [`JobType::ModelClassify`] jobs. On completion (success or
/// degradation) it enqueues collection matching directly, so membership
/// converges without waiting for the scheduled safety-net job.
pub struct ModelClassifyHandler {
    db: Database,
    service: ClassificationService,
}

impl ModelClassifyHandler {
    /// Create a model-classify handler.
    pub fn new(db: Database, service: ClassificationService) -> Self {
        Self { db, service }
    }

    async fn queue_collection_match(&self, content_id: uuid::Uuid) {
        // Deduplicated: the safety-net job from ingestion may already be
        // pending, and a duplicate run would be harmless anyway.
        let _ = self
            .db
            .jobs
            .queue_deduplicated(
                Some(content_id),
                JobType::CollectionMatch,
                JobType::CollectionMatch.default_priority(),
                None,
                0,
            )
            .await;
    }
}

#[async_trait]
impl JobHandler for ModelClassifyHandler {
    fn job_type(&self) -> JobType {
        JobType::ModelClassify
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let Some(content_id) = ctx.content_id() else {
            return JobResult::Failed("Model classify job carries no content id".to_string());
        };
        let force = ctx.payload_bool("force_reclassify", false);

        match self.service.classify(content_id, force).await {
            Ok(ClassificationOutcome::Classified {
                category_name,
                confidence,
                used_fallback,
                ..
            }) => {
                self.queue_collection_match(content_id).await;
                JobResult::Success(Some(json!({
                    "category": category_name,
                    "confidence": confidence,
                    "used_fallback": used_fallback,
                })))
            }
            Ok(ClassificationOutcome::AlreadyClassified { category_id }) => {
                self.queue_collection_match(content_id).await;
                JobResult::Success(Some(json!({
                    "category_id": category_id,
                    "status": "already_classified",
                })))
            }
            Ok(ClassificationOutcome::Retrying(reason)) => JobResult::Retry(reason),
            Ok(ClassificationOutcome::Degraded { error }) => {
                // The stage handled the degradation itself; the job is
                // done. Matching still runs over the heuristic label.
                self.queue_collection_match(content_id).await;
                JobResult::Success(Some(json!({
                    "status": "degraded",
                    "error": error,
                })))
            }
            Err(e) => JobResult::Failed(e.to_string()),
        }
    }
}
