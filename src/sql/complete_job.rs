use indoc::indoc;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{query, SqlitePool};

use crate::errors::Result;
use crate::utils::now_timestamp;

/// Finalize a successful execution.
///
/// Both updates are conditional on the row still being `running`: if the
/// timeout sweep reassigned the job while it was executing, neither the job
/// row nor the (already closed) execution row is touched. Returns whether
/// the job row was updated.
pub async fn complete_job(
    pool: &SqlitePool,
    job_id: &str,
    execution_id: &str,
    worker_id: &str,
    result: &Value,
) -> Result<bool> {
    let now = now_timestamp();
    let mut tx = pool.begin().await?;

    query(indoc! {r#"
        update job_executions set
            status = 'completed',
            completed_at = ?1,
            result = ?2
        where id = ?3 and status = 'running'
    "#})
    .bind(&now)
    .bind(Json(result))
    .bind(execution_id)
    .execute(&mut *tx)
    .await?;

    let updated = query(indoc! {r#"
        update jobs set
            status = 'completed',
            completed_at = ?1,
            updated_at = ?1,
            result = ?2,
            error = null
        where id = ?3 and worker_id = ?4 and status = 'running'
    "#})
    .bind(&now)
    .bind(Json(result))
    .bind(job_id)
    .bind(worker_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    Ok(updated > 0)
}
