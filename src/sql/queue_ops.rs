use indoc::{formatdoc, indoc};
use sqlx::{query, query_as, SqliteExecutor, SqlitePool};

use crate::errors::Result;
use crate::job::{Job, JobExecution, JobStatus};
use crate::utils::now_timestamp;

pub async fn get_job_by_id<'e>(
    executor: impl SqliteExecutor<'e>,
    job_id: &str,
) -> Result<Option<Job>> {
    let job = query_as("select * from jobs where id = ?1")
        .bind(job_id)
        .fetch_optional(executor)
        .await?;

    Ok(job)
}

pub async fn get_executions<'e>(
    executor: impl SqliteExecutor<'e>,
    job_id: &str,
) -> Result<Vec<JobExecution>> {
    let executions = query_as(indoc! {r#"
        select * from job_executions
            where job_id = ?1
            order by started_at asc, id asc
    "#})
    .bind(job_id)
    .fetch_all(executor)
    .await?;

    Ok(executions)
}

/// Cancel a job that is `pending` or `failed`. Returns whether a row was
/// modified; a job in any other status is left untouched.
pub async fn cancel_job<'e>(executor: impl SqliteExecutor<'e>, job_id: &str) -> Result<bool> {
    let cancelled = query(indoc! {r#"
        update jobs set
            status = 'cancelled',
            updated_at = ?1
        where id = ?2 and status in ('pending', 'failed')
    "#})
    .bind(now_timestamp())
    .bind(job_id)
    .execute(executor)
    .await?
    .rows_affected();

    Ok(cancelled > 0)
}

/// Reset a terminally `failed`, `cancelled` or `timeout` job back to
/// `pending` with a fresh attempt budget. Returns whether a row was modified.
pub async fn requeue_job<'e>(executor: impl SqliteExecutor<'e>, job_id: &str) -> Result<bool> {
    let requeued = query(indoc! {r#"
        update jobs set
            status = 'pending',
            attempts = 0,
            worker_id = null,
            error = null,
            result = null,
            started_at = null,
            completed_at = null,
            updated_at = ?1
        where id = ?2 and status in ('failed', 'cancelled', 'timeout')
    "#})
    .bind(now_timestamp())
    .bind(job_id)
    .execute(executor)
    .await?
    .rows_affected();

    Ok(requeued > 0)
}

pub async fn list_jobs<'e>(
    executor: impl SqliteExecutor<'e>,
    status: Option<JobStatus>,
    workflow_id: Option<&str>,
    limit: Option<u32>,
) -> Result<Vec<Job>> {
    let mut clauses = Vec::new();
    if status.is_some() {
        clauses.push("status = ?");
    }
    if workflow_id.is_some() {
        clauses.push("executing_workflow_id = ?");
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("where {}", clauses.join(" and "))
    };
    let limit_clause = if limit.is_some() { "limit ?" } else { "" };

    let sql = formatdoc! {r#"
        select * from jobs
            {where_clause}
            order by created_at desc, id desc
            {limit_clause}
    "#};

    let mut q = query_as(&sql);
    if let Some(status) = status {
        q = q.bind(status);
    }
    if let Some(workflow_id) = workflow_id {
        q = q.bind(workflow_id);
    }
    if let Some(limit) = limit {
        q = q.bind(limit);
    }

    let jobs = q.fetch_all(executor).await?;
    Ok(jobs)
}

/// Delete terminally-statused jobs older than `cutoff` (a formatted
/// timestamp), together with their executions. Cancelled rows carry no
/// `completed_at`, so age falls back to `updated_at`. Returns the number of
/// jobs deleted.
pub async fn cleanup_jobs(pool: &SqlitePool, cutoff: &str) -> Result<u64> {
    let mut tx = pool.begin().await?;

    query(indoc! {r#"
        delete from job_executions where job_id in (
            select id from jobs
                where status in ('completed', 'failed', 'cancelled', 'timeout')
                and coalesce(completed_at, updated_at) < ?1
        )
    "#})
    .bind(cutoff)
    .execute(&mut *tx)
    .await?;

    let deleted = query(indoc! {r#"
        delete from jobs
            where status in ('completed', 'failed', 'cancelled', 'timeout')
            and coalesce(completed_at, updated_at) < ?1
    "#})
    .bind(cutoff)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    Ok(deleted)
}
