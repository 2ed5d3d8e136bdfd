use std::path::Path;

use getset::Getters;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::errors::{Result, SqliteWorkerError};
use crate::job::{Job, JobExecution, JobStatus};
use crate::job_spec::JobSpec;
use crate::migrate::migrate;
use crate::sql::add_job::add_job;
use crate::sql::queue_ops::{
    cancel_job, cleanup_jobs, get_executions, get_job_by_id, list_jobs, requeue_job,
};
use crate::utils::now_timestamp;

/// A job row together with its execution history, ordered by start time.
#[derive(Getters, Debug, Clone)]
#[getset(get = "pub")]
pub struct JobStatusRecord {
    job: Job,
    executions: Vec<JobExecution>,
}

/// Filter for [`Queue::list`]. All fields are optional; unset fields match
/// every job.
#[derive(Default, Debug, Clone)]
pub struct JobFilter {
    /// Only jobs in this status.
    pub status: Option<JobStatus>,
    /// Only jobs submitted by this workflow.
    pub workflow_id: Option<String>,
    /// At most this many rows.
    pub limit: Option<u32>,
}

/// The primary interface for submitting and managing jobs.
///
/// A `Queue` owns a pool of sessions to the backing database and performs
/// every mutation in a short transaction; it never holds locks across user
/// code.
#[derive(Clone)]
pub struct Queue {
    pool: SqlitePool,
}

impl Queue {
    /// Opens (creating if necessary) the queue database at `path` and brings
    /// its schema up to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Queue> {
        let pool = crate::db::connect(path).await?;
        migrate(&pool).await?;
        Ok(Queue { pool })
    }

    /// Wraps an existing pool. The caller is responsible for having run
    /// [`migrate`](crate::migrate::migrate).
    pub fn with_pool(pool: SqlitePool) -> Queue {
        Queue { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Submits a job for execution and returns its generated id.
    ///
    /// Dependency ids are not verified to exist: eligibility is evaluated
    /// lazily by workers, and a reference to an id that never appears keeps
    /// the job pending forever.
    pub async fn submit(&self, spec: &JobSpec) -> Result<String> {
        self.submit_tagged(spec, None).await
    }

    /// Submits a job tagged with a workflow id.
    pub async fn submit_in_workflow(&self, spec: &JobSpec, workflow_id: &str) -> Result<String> {
        self.submit_tagged(spec, Some(workflow_id)).await
    }

    async fn submit_tagged(&self, spec: &JobSpec, workflow_id: Option<&str>) -> Result<String> {
        spec.validate()?;
        let id = Uuid::new_v4().to_string();
        add_job(&self.pool, &id, spec, workflow_id, &now_timestamp()).await?;
        Ok(id)
    }

    /// Submits a batch of jobs with pre-assigned ids in one transaction, all
    /// tagged with the same workflow id. Used by workflow submission so the
    /// whole graph becomes visible atomically.
    pub(crate) async fn submit_batch(
        &self,
        jobs: &[(String, JobSpec)],
        workflow_id: &str,
    ) -> Result<()> {
        for (_, spec) in jobs {
            spec.validate()?;
        }

        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;
        for (id, spec) in jobs {
            add_job(&mut *tx, id, spec, Some(workflow_id), &now).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Cancels a `pending` or `failed` job. Returns whether a row was
    /// modified. Cancelling a `running` job returns `false`: a running job
    /// is never interrupted in-process.
    pub async fn cancel(&self, job_id: &str) -> Result<bool> {
        let cancelled = cancel_job(&self.pool, job_id).await?;
        if cancelled {
            info!(job_id, "Job cancelled");
        }
        Ok(cancelled)
    }

    /// Resets a `failed`, `cancelled` or `timeout` job back to `pending`
    /// with `attempts = 0` and cleared error/result. Returns whether a row
    /// was modified; applying it twice is equivalent to applying it once.
    pub async fn requeue(&self, job_id: &str) -> Result<bool> {
        let requeued = requeue_job(&self.pool, job_id).await?;
        if requeued {
            info!(job_id, "Job requeued");
        }
        Ok(requeued)
    }

    /// Returns the job row plus its executions ordered by start time.
    pub async fn get_status(&self, job_id: &str) -> Result<JobStatusRecord> {
        let job = get_job_by_id(&self.pool, job_id)
            .await?
            .ok_or_else(|| SqliteWorkerError::NotFound(job_id.to_string()))?;
        let executions = get_executions(&self.pool, job_id).await?;

        Ok(JobStatusRecord { job, executions })
    }

    /// Lists jobs matching `filter`, most recently created first.
    pub async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        list_jobs(
            &self.pool,
            filter.status,
            filter.workflow_id.as_deref(),
            filter.limit,
        )
        .await
    }

    /// Deletes jobs in terminal statuses older than `older_than_days`,
    /// together with their executions. Returns how many jobs were removed.
    pub async fn cleanup(&self, older_than_days: u32) -> Result<u64> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(i64::from(older_than_days));
        let deleted = cleanup_jobs(&self.pool, &crate::utils::format_timestamp(&cutoff)).await?;
        info!(deleted, older_than_days, "Cleaned up terminal jobs");
        Ok(deleted)
    }
}
