use indoc::indoc;
use sqlx::{query, SqlitePool};

use crate::errors::Result;
use crate::utils::now_timestamp;

/// Move expired `running` jobs out of that state.
///
/// For each job whose `started_at + timeout_seconds` has passed: the open
/// execution row is closed as `timeout`, and the job either returns to
/// `pending` (attempts remaining) or terminally times out. The attempt was
/// already counted when the job was claimed, so the sweep does not touch
/// `attempts`. The execution rows are closed first so both statements see
/// the same set of expired jobs. Returns how many jobs were swept.
pub async fn sweep_timed_out_jobs(pool: &SqlitePool) -> Result<u64> {
    let now = now_timestamp();
    let mut tx = pool.begin().await?;

    query(indoc! {r#"
        update job_executions set
            status = 'timeout',
            completed_at = ?1,
            error = 'timed out after ' || (
                select timeout_seconds from jobs where jobs.id = job_executions.job_id
            ) || ' seconds'
        where status = 'running'
        and job_id in (
            select id from jobs
                where status = 'running'
                and unixepoch(started_at) + timeout_seconds <= unixepoch(?1)
        )
    "#})
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    let swept = query(indoc! {r#"
        update jobs set
            status = case
                when attempts < max_attempts then 'pending'
                else 'timeout'
            end,
            worker_id = case
                when attempts < max_attempts then null
                else worker_id
            end,
            started_at = case
                when attempts < max_attempts then null
                else started_at
            end,
            completed_at = case
                when attempts < max_attempts then null
                else ?1
            end,
            error = case
                when attempts < max_attempts then error
                else 'timed out after ' || timeout_seconds || ' seconds'
            end,
            updated_at = ?1
        where status = 'running'
        and unixepoch(started_at) + timeout_seconds <= unixepoch(?1)
    "#})
    .bind(&now)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    Ok(swept)
}
