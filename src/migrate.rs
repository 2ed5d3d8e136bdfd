use indoc::indoc;
use sqlx::{query, Row, SqlitePool};
use tracing::info;

use crate::errors::Result;
use crate::utils::now_timestamp;

/// Ordered schema migrations. Each entry is a list of statements applied in
/// one transaction; applied entries are recorded in the `migrations` table
/// and skipped on subsequent opens.
const MIGRATIONS: &[&[&str]] = &[&[
    indoc! {r#"
        create table jobs (
            id text primary key,
            name text not null,
            function_identifier text not null,
            parameters text not null default '{}',
            priority integer not null default 0,
            dependencies text not null default '[]',
            max_attempts integer not null,
            attempts integer not null default 0,
            timeout_seconds integer not null,
            status text not null,
            created_at text not null,
            updated_at text not null,
            started_at text,
            completed_at text,
            worker_id text,
            result text,
            error text,
            executing_workflow_id text
        )
    "#},
    "create index jobs_status on jobs (status)",
    "create index jobs_workflow on jobs (executing_workflow_id)",
    indoc! {r#"
        create table job_executions (
            id text primary key,
            job_id text not null references jobs (id),
            worker_id text not null,
            started_at text not null,
            completed_at text,
            status text not null,
            result text,
            error text
        )
    "#},
    "create index executions_job on job_executions (job_id)",
]];

/// Brings the database schema up to date.
///
/// Safe to call on every open; already-applied migrations are skipped.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    query(indoc! {r#"
        create table if not exists migrations (
            id integer primary key,
            ts text not null
        )
    "#})
    .execute(pool)
    .await?;

    let last_migration: Option<i64> =
        query("select id from migrations order by id desc limit 1")
            .fetch_optional(pool)
            .await?
            .map(|row| row.get("id"));

    for (i, migration_statements) in MIGRATIONS.iter().enumerate() {
        let migration_number = (i + 1) as i64;

        if last_migration.is_none() || migration_number > last_migration.unwrap() {
            info!(migration_number, "Executing migration");
            let mut tx = pool.begin().await?;

            for migration_statement in migration_statements.iter() {
                query(migration_statement).execute(&mut *tx).await?;
            }

            query("insert into migrations (id, ts) values (?1, ?2)")
                .bind(migration_number)
                .bind(now_timestamp())
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
        }
    }

    Ok(())
}
