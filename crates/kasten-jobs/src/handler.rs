//! Job handler trait and execution context.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use kasten_core::{Job, JobType};

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: Job,
}

impl JobContext {
    /// Create a new job context.
    pub fn new(job: Job) -> Self {
        Self { job }
    }

    /// Get the content ID for this job, if any.
    pub fn content_id(&self) -> Option<Uuid> {
        self.job.content_id
    }

    /// Get the job payload.
    pub fn payload(&self) -> Option<&JsonValue> {
        self.job.payload.as_ref()
    }

    /// Read a boolean payload field, defaulting when absent.
    pub fn payload_bool(&self, key: &str, default: bool) -> bool {
        self.payload()
            .and_then(|p| p.get(key))
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    /// Read a string payload field.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload().and_then(|p| p.get(key)).and_then(|v| v.as_str())
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum JobResult {
    /// Job completed successfully with optional result data.
    Success(Option<JsonValue>),
    /// Job failed; the queue applies retry-with-backoff semantics.
    Failed(String),
    /// A stage precondition is not met yet. The job is re-queued with a
    /// short fixed delay and does not consume a retry attempt. This is
    /// the system's substitute for locking between dependent stages.
    Retry(String),
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job type this handler processes.
    fn job_type(&self) -> JobType;

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kasten_core::JobStatus;
    use serde_json::json;

    fn job_with_payload(payload: Option<JsonValue>) -> Job {
        Job {
            id: Uuid::new_v4(),
            content_id: Some(Uuid::new_v4()),
            job_type: JobType::QuickClassify,
            status: JobStatus::Pending,
            priority: 9,
            payload,
            result: None,
            error_message: None,
            retry_count: 0,
            max_retries: 3,
            run_after: Utc::now(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_context_accessors() {
        let job = job_with_payload(Some(json!({
            "update_display": true,
            "path": "/tmp/报告.docx"
        })));
        let content_id = job.content_id;
        let ctx = JobContext::new(job);

        assert_eq!(ctx.content_id(), content_id);
        assert!(ctx.payload_bool("update_display", false));
        assert_eq!(ctx.payload_str("path"), Some("/tmp/报告.docx"));
    }

    #[test]
    fn test_payload_defaults() {
        let ctx = JobContext::new(job_with_payload(None));
        assert!(ctx.payload().is_none());
        assert!(ctx.payload_bool("missing", true));
        assert!(!ctx.payload_bool("missing", false));
        assert_eq!(ctx.payload_str("missing"), None);
    }
}
