use indoc::indoc;
use sqlx::types::Json;
use sqlx::{query_as, SqliteExecutor};
use tracing::info;

use crate::errors::Result;
use crate::job::Job;
use crate::job_spec::JobSpec;

/// Insert a pending job row with a caller-assigned id.
pub async fn add_job<'e>(
    executor: impl SqliteExecutor<'e>,
    id: &str,
    spec: &JobSpec,
    workflow_id: Option<&str>,
    now: &str,
) -> Result<Job> {
    let sql = indoc! {r#"
        insert into jobs (
            id,
            name,
            function_identifier,
            parameters,
            priority,
            dependencies,
            max_attempts,
            timeout_seconds,
            executing_workflow_id,
            status,
            created_at,
            updated_at
        )
        values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending', ?10, ?10)
        returning *
    "#};

    let job: Job = query_as(sql)
        .bind(id)
        .bind(spec.name())
        .bind(spec.function_identifier())
        .bind(Json(spec.params()))
        .bind(spec.priority())
        .bind(Json(spec.dependencies()))
        .bind(spec.max_attempts())
        .bind(spec.timeout_seconds())
        .bind(workflow_id)
        .bind(now)
        .fetch_one(executor)
        .await?;

    info!(
        job_id = %id,
        function_identifier = %spec.function_identifier(),
        "Job added to queue"
    );

    Ok(job)
}
