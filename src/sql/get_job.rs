use indoc::indoc;
use sqlx::{query, query_as, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::errors::Result;
use crate::job::Job;
use crate::utils::now_timestamp;

/// Cancel pending jobs that can never run because a dependency ended in a
/// terminal status other than `completed`. Runs as a single atomic statement
/// ahead of each claim attempt.
pub async fn cancel_blocked_jobs<'e>(executor: impl SqliteExecutor<'e>) -> Result<u64> {
    let sql = indoc! {r#"
        update jobs set
            status = 'cancelled',
            error = (
                select 'dependency ' || parent.id || ' ended in status ' || parent.status
                    from json_each(jobs.dependencies) as dep
                    join jobs as parent on parent.id = dep.value
                    where parent.status in ('failed', 'cancelled', 'timeout')
                    limit 1
            ),
            updated_at = ?1
        where status = 'pending'
        and exists (
            select 1
                from json_each(jobs.dependencies) as dep
                join jobs as parent on parent.id = dep.value
                where parent.status in ('failed', 'cancelled', 'timeout')
        )
    "#};

    let cancelled = query(sql)
        .bind(now_timestamp())
        .execute(executor)
        .await?
        .rows_affected();

    Ok(cancelled)
}

/// Atomically claim the highest-priority eligible pending job for
/// `worker_id`.
///
/// Eligibility requires every dependency id to resolve to a `completed` job;
/// a missing dependency keeps the job pending. The claim is a single UPDATE
/// whose nested select picks one candidate, so SQLite's writer serialization
/// guarantees exactly one winner however many workers race for the same row.
///
/// Returns the claimed job (attempts already incremented) together with the
/// id of the freshly opened execution row.
pub async fn get_job(pool: &SqlitePool, worker_id: &str) -> Result<Option<(Job, String)>> {
    let now = now_timestamp();

    let claim_sql = indoc! {r#"
        update jobs set
            status = 'running',
            worker_id = ?1,
            started_at = ?2,
            updated_at = ?2,
            attempts = attempts + 1
        where id = (
            select candidate.id
                from jobs as candidate
                where candidate.status = 'pending'
                and not exists (
                    select 1
                        from json_each(candidate.dependencies) as dep
                        left join jobs as parent on parent.id = dep.value
                        where parent.id is null or parent.status <> 'completed'
                )
                order by candidate.priority desc, candidate.created_at asc, candidate.id asc
                limit 1
        )
        and status = 'pending'
        returning *
    "#};

    let mut tx = pool.begin().await?;

    let job: Option<Job> = query_as(claim_sql)
        .bind(worker_id)
        .bind(&now)
        .fetch_optional(&mut *tx)
        .await?;

    let Some(job) = job else {
        tx.commit().await?;
        return Ok(None);
    };

    let execution_id = Uuid::new_v4().to_string();
    query(indoc! {r#"
        insert into job_executions (id, job_id, worker_id, started_at, status)
        values (?1, ?2, ?3, ?4, 'running')
    "#})
    .bind(&execution_id)
    .bind(job.id())
    .bind(worker_id)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some((job, execution_id)))
}
