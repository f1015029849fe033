//! Quick classification handler.

use async_trait::async_trait;
use serde_json::json;

use kasten_core::JobType;

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::quick::{QuickClassifier, QuickOutcome};

/// Handler for [`JobType::QuickClassify`] jobs.
pub struct QuickClassifyHandler {
    classifier: QuickClassifier,
}

impl QuickClassifyHandler {
    /// Create a quick-classify handler.
    pub fn new(classifier: QuickClassifier) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl JobHandler for QuickClassifyHandler {
    fn job_type(&self) -> JobType {
        JobType::QuickClassify
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let Some(content_id) = ctx.content_id() else {
            return JobResult::Failed("Quick classify job carries no content id".to_string());
        };
        let update_display = ctx.payload_bool("update_display", false);

        match self.classifier.quick_classify(content_id, update_display).await {
            Ok(QuickOutcome::Classified {
                category_name,
                confidence,
                ..
            }) => JobResult::Success(Some(json!({
                "category": category_name,
                "confidence": confidence,
                "is_quick": true,
            }))),
            Ok(QuickOutcome::AlreadyClassified { category_id }) => {
                JobResult::Success(Some(json!({
                    "category_id": category_id,
                    "is_quick": false,
                })))
            }
            Err(e) => JobResult::Failed(e.to_string()),
        }
    }
}
