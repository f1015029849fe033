//! Collection matching handler.

use async_trait::async_trait;
use serde_json::json;

use kasten_core::{ClassificationStatus, ContentRepository, JobType};
use kasten_db::Database;

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::matcher::CollectionMatcher;

/// Handler for [`JobType::CollectionMatch`] jobs. Membership is only
/// recomputed after classification has settled; an early delivery
/// re-checks after a short delay.
pub struct CollectionMatchHandler {
    db: Database,
    matcher: CollectionMatcher,
}

impl CollectionMatchHandler {
    /// Create a collection-match handler.
    pub fn new(db: Database, matcher: CollectionMatcher) -> Self {
        Self { db, matcher }
    }
}

#[async_trait]
impl JobHandler for CollectionMatchHandler {
    fn job_type(&self) -> JobType {
        JobType::CollectionMatch
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let Some(content_id) = ctx.content_id() else {
            return JobResult::Failed("Collection match job carries no content id".to_string());
        };

        let content = match self.db.contents.fetch(content_id).await {
            Ok(content) => content,
            Err(e) => return JobResult::Failed(e.to_string()),
        };

        // Wait for the classifier race to settle: AiProcessing means the
        // model stage owns the label and is about to finish; anything
        // earlier means classification has not started arbitrating yet.
        if matches!(
            content.state.classification_status,
            ClassificationStatus::Pending
                | ClassificationStatus::QuickProcessing
                | ClassificationStatus::QuickDone
        ) {
            return JobResult::Retry(format!(
                "classification_status={}",
                content.state.classification_status.as_str()
            ));
        }

        match self.matcher.match_collections(content_id).await {
            Ok(matched) => JobResult::Success(Some(json!({
                "matched_collections": matched,
                "count": matched.len(),
            }))),
            Err(e) => JobResult::Failed(e.to_string()),
        }
    }
}
