use indoc::indoc;
use sqlx::{query, SqlitePool};

use crate::errors::Result;
use crate::utils::now_timestamp;

/// Finalize a failed execution.
///
/// With `retry` set the job goes back to `pending` for another attempt;
/// otherwise it is permanently `failed`. Both updates are conditional on the
/// row still being `running` so a job reassigned by the timeout sweep is left
/// alone. Returns whether the job row was updated.
pub async fn fail_job(
    pool: &SqlitePool,
    job_id: &str,
    execution_id: &str,
    worker_id: &str,
    message: &str,
    retry: bool,
) -> Result<bool> {
    let now = now_timestamp();
    let mut tx = pool.begin().await?;

    query(indoc! {r#"
        update job_executions set
            status = 'failed',
            completed_at = ?1,
            error = ?2
        where id = ?3 and status = 'running'
    "#})
    .bind(&now)
    .bind(message)
    .bind(execution_id)
    .execute(&mut *tx)
    .await?;

    let job_sql = if retry {
        indoc! {r#"
            update jobs set
                status = 'pending',
                worker_id = null,
                started_at = null,
                error = ?1,
                updated_at = ?2
            where id = ?3 and worker_id = ?4 and status = 'running'
        "#}
    } else {
        indoc! {r#"
            update jobs set
                status = 'failed',
                completed_at = ?2,
                error = ?1,
                updated_at = ?2
            where id = ?3 and worker_id = ?4 and status = 'running'
        "#}
    };

    let updated = query(job_sql)
        .bind(message)
        .bind(&now)
        .bind(job_id)
        .bind(worker_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    Ok(updated > 0)
}
