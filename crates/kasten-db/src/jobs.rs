//! Job queue repository implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use tokio::sync::Notify;
use uuid::Uuid;

use kasten_core::{new_v7, Error, Job, JobRepository, JobStatus, JobType, QueueStats, Result};

/// PostgreSQL implementation of JobRepository.
///
/// Delivery is at-least-once: a worker crash after claim leaves the job
/// `running` until an operator or a future recovery sweep re-queues it,
/// and handlers must tolerate duplicate execution.
#[derive(Clone)]
pub struct PgJobRepository {
    pool: Pool<Postgres>,
    /// Notify handle for event-driven worker wake on queue inserts.
    notify: Arc<Notify>,
}

impl PgJobRepository {
    /// Create a new PgJobRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Get the job notification handle for event-driven waking.
    pub fn job_notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    /// Convert JobType to string for database.
    fn job_type_to_str(job_type: JobType) -> &'static str {
        match job_type {
            JobType::Ingest => "ingest",
            JobType::Embedding => "embedding",
            JobType::QuickClassify => "quick_classify",
            JobType::ModelClassify => "model_classify",
            JobType::CollectionMatch => "collection_match",
        }
    }

    /// Convert string from database to JobType.
    fn str_to_job_type(s: &str) -> JobType {
        match s {
            "ingest" => JobType::Ingest,
            "embedding" => JobType::Embedding,
            "quick_classify" => JobType::QuickClassify,
            "collection_match" => JobType::CollectionMatch,
            _ => JobType::ModelClassify,
        }
    }

    /// Convert string from database to JobStatus.
    fn str_to_job_status(s: &str) -> JobStatus {
        match s {
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }

    /// Parse a job row into a Job struct.
    fn parse_job_row(row: sqlx::postgres::PgRow) -> Job {
        Job {
            id: row.get("id"),
            content_id: row.get("content_id"),
            job_type: Self::str_to_job_type(row.get("job_type")),
            status: Self::str_to_job_status(row.get("status")),
            priority: row.get("priority"),
            payload: row.get("payload"),
            result: row.get("result"),
            error_message: row.get("error_message"),
            retry_count: row.get("retry_count"),
            max_retries: row.get("max_retries"),
            run_after: row.get("run_after"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        }
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn queue(
        &self,
        content_id: Option<Uuid>,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
        delay_secs: i64,
    ) -> Result<Uuid> {
        let job_id = new_v7();
        let now = Utc::now();
        let run_after = now + Duration::seconds(delay_secs.max(0));

        sqlx::query(
            "INSERT INTO job_queue
                 (id, content_id, job_type, status, priority, payload, max_retries,
                  run_after, created_at)
             VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8)",
        )
        .bind(job_id)
        .bind(content_id)
        .bind(Self::job_type_to_str(job_type))
        .bind(priority)
        .bind(&payload)
        .bind(kasten_core::defaults::JOB_MAX_RETRIES)
        .bind(run_after)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.notify.notify_waiters();
        Ok(job_id)
    }

    async fn queue_deduplicated(
        &self,
        content_id: Option<Uuid>,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
        delay_secs: i64,
    ) -> Result<Option<Uuid>> {
        // Atomic check-and-insert prevents TOCTOU races between concurrent
        // enqueues. Only deduplicates when a content id is present.
        let Some(cid) = content_id else {
            return self
                .queue(content_id, job_type, priority, payload, delay_secs)
                .await
                .map(Some);
        };

        let job_id = new_v7();
        let now = Utc::now();
        let run_after = now + Duration::seconds(delay_secs.max(0));
        let job_type_str = Self::job_type_to_str(job_type);

        let result = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO job_queue
                 (id, content_id, job_type, status, priority, payload, max_retries,
                  run_after, created_at)
             SELECT $1, $2, $3, 'pending', $4, $5, $6, $7, $8
             WHERE NOT EXISTS (
                 SELECT 1 FROM job_queue
                 WHERE content_id = $2 AND job_type = $3
                   AND status IN ('pending', 'running')
             )
             RETURNING id",
        )
        .bind(job_id)
        .bind(cid)
        .bind(job_type_str)
        .bind(priority)
        .bind(&payload)
        .bind(kasten_core::defaults::JOB_MAX_RETRIES)
        .bind(run_after)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.is_some() {
            self.notify.notify_waiters();
        }
        Ok(result)
    }

    async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>> {
        let now = Utc::now();
        let type_strings: Vec<String> = job_types
            .iter()
            .map(|jt| Self::job_type_to_str(*jt).to_string())
            .collect();

        // FOR UPDATE SKIP LOCKED allows concurrent workers to claim without
        // blocking each other. run_after implements per-job delay.
        let row = sqlx::query(
            "UPDATE job_queue
             SET status = 'running', started_at = $1
             WHERE id = (
                 SELECT id FROM job_queue
                 WHERE status = 'pending'
                   AND run_after <= $1
                   AND (cardinality($2::text[]) = 0 OR job_type = ANY($2))
                 ORDER BY priority DESC, run_after ASC, created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING *",
        )
        .bind(now)
        .bind(&type_strings)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn reschedule(&self, job_id: Uuid, delay_secs: i64) -> Result<()> {
        let run_after = Utc::now() + Duration::seconds(delay_secs.max(0));
        sqlx::query(
            "UPDATE job_queue
             SET status = 'pending', started_at = NULL, run_after = $1
             WHERE id = $2",
        )
        .bind(run_after)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        sqlx::query(
            "UPDATE job_queue
             SET status = 'completed', result = $1, completed_at = $2
             WHERE id = $3",
        )
        .bind(&result)
        .bind(Utc::now())
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let now = Utc::now();

        // Jobs with retries left go back to pending with linear backoff;
        // exhausted jobs become terminal failures.
        sqlx::query(
            "UPDATE job_queue
             SET retry_count = retry_count + 1,
                 error_message = $1,
                 status = CASE WHEN retry_count + 1 >= max_retries
                               THEN 'failed' ELSE 'pending' END,
                 completed_at = CASE WHEN retry_count + 1 >= max_retries
                                     THEN $2 ELSE NULL END,
                 started_at = NULL,
                 run_after = $2 + make_interval(secs => (retry_count + 1) * 10)
             WHERE id = $3",
        )
        .bind(error)
        .bind(now)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.notify.notify_waiters();
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query("SELECT * FROM job_queue WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM job_queue WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(count.0)
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(
            "SELECT
                 COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                 COUNT(*) FILTER (WHERE status = 'running') AS running,
                 COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                 COUNT(*) FILTER (WHERE status = 'failed') AS failed
             FROM job_queue",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(QueueStats {
            pending: row.get("pending"),
            running: row.get("running"),
            completed: row.get("completed"),
            failed: row.get("failed"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_roundtrip() {
        for jt in [
            JobType::Ingest,
            JobType::Embedding,
            JobType::QuickClassify,
            JobType::ModelClassify,
            JobType::CollectionMatch,
        ] {
            let s = PgJobRepository::job_type_to_str(jt);
            assert_eq!(PgJobRepository::str_to_job_type(s), jt);
        }
    }

    #[test]
    fn test_job_status_parse() {
        assert_eq!(
            PgJobRepository::str_to_job_status("running"),
            JobStatus::Running
        );
        assert_eq!(
            PgJobRepository::str_to_job_status("unknown"),
            JobStatus::Pending
        );
    }
}
