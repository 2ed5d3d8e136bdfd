use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use sqlite_worker::{ExecutionStatus, JobSpec, JobStatus};
use tokio::time::sleep;

mod helpers;

#[tokio::test]
async fn expired_job_is_returned_to_pending_by_the_sweep() {
    let db = helpers::create_test_db().await;

    let worker = Arc::new(
        db.create_worker_options()
            .worker_id("slow-worker")
            .define_job("tests.sleepy", |_: Value| async move {
                sleep(Duration::from_secs(2)).await;
                Ok::<_, String>(json!("done"))
            })
            .init()
            .await
            .expect("Failed to init worker"),
    );

    let job_id = db
        .queue
        .submit(
            &JobSpec::builder()
                .name("sleepy_job")
                .function_identifier("tests.sleepy")
                .timeout_seconds(1)
                .max_attempts(2)
                .build(),
        )
        .await
        .expect("Failed to submit");

    // The worker claims the job and blocks in user code
    let running_worker = worker.clone();
    let handle = tokio::spawn(async move { running_worker.run_once().await });

    sleep(Duration::from_millis(1300)).await;

    // A second worker's sweep recovers the expired claim
    let sweeper = db
        .create_worker_options()
        .worker_id("sweeper")
        .init()
        .await
        .expect("Failed to init worker");
    let swept = sweeper.sweep_timeouts().await.expect("Failed to sweep");
    assert_eq!(swept, 1);

    let record = db.queue.get_status(&job_id).await.unwrap();
    assert_eq!(*record.job().status(), JobStatus::Pending);
    assert_eq!(*record.job().attempts(), 1);
    assert!(record.job().worker_id().is_none());
    assert!(record.job().started_at().is_none());

    assert_eq!(record.executions().len(), 1);
    let execution = &record.executions()[0];
    assert_eq!(*execution.status(), ExecutionStatus::Timeout);
    assert!(execution
        .error()
        .as_ref()
        .unwrap()
        .contains("timed out after 1 seconds"));

    // The original worker eventually finishes; its finalize must be rejected
    // because the sweep already reassigned the job.
    let executed = handle
        .await
        .expect("worker task should not panic")
        .expect("Failed to run worker");
    assert!(executed);

    let record = db.queue.get_status(&job_id).await.unwrap();
    assert_eq!(*record.job().status(), JobStatus::Pending);
    assert_eq!(*record.job().attempts(), 1);
    assert!(record.job().result().is_none());
    assert_eq!(*record.executions()[0].status(), ExecutionStatus::Timeout);
}

#[tokio::test]
async fn expired_job_without_attempts_left_times_out_terminally() {
    let db = helpers::create_test_db().await;

    let worker = Arc::new(
        db.create_worker_options()
            .define_job("tests.sleepy", |_: Value| async move {
                sleep(Duration::from_secs(2)).await;
                Ok::<_, String>(json!("done"))
            })
            .init()
            .await
            .expect("Failed to init worker"),
    );

    let job_id = db
        .queue
        .submit(
            &JobSpec::builder()
                .name("sleepy_job")
                .function_identifier("tests.sleepy")
                .timeout_seconds(1)
                .max_attempts(1)
                .build(),
        )
        .await
        .expect("Failed to submit");

    let running_worker = worker.clone();
    let handle = tokio::spawn(async move { running_worker.run_once().await });

    sleep(Duration::from_millis(1300)).await;

    let swept = worker.sweep_timeouts().await.expect("Failed to sweep");
    assert_eq!(swept, 1);

    let record = db.queue.get_status(&job_id).await.unwrap();
    assert_eq!(*record.job().status(), JobStatus::Timeout);
    assert_eq!(*record.job().attempts(), 1);
    assert!(record.job().completed_at().is_some());
    assert_eq!(
        record.job().error().as_deref(),
        Some("timed out after 1 seconds")
    );

    // Terminal timeout can be requeued for a fresh attempt budget
    handle
        .await
        .expect("worker task should not panic")
        .expect("Failed to run worker");
    assert!(db.queue.requeue(&job_id).await.expect("Failed to requeue"));
    let record = db.queue.get_status(&job_id).await.unwrap();
    assert_eq!(*record.job().status(), JobStatus::Pending);
    assert_eq!(*record.job().attempts(), 0);
}

#[tokio::test]
async fn sweep_ignores_jobs_within_their_deadline() {
    let db = helpers::create_test_db().await;

    let worker = db
        .create_worker_options()
        .init()
        .await
        .expect("Failed to init worker");

    let job_id = db
        .queue
        .submit(&JobSpec::new("fresh", "tests.whatever"))
        .await
        .expect("Failed to submit");

    // Pending jobs are never swept
    assert_eq!(worker.sweep_timeouts().await.expect("Failed to sweep"), 0);

    sqlx::query("update jobs set status = 'running', worker_id = 'w', started_at = ?1 where id = ?2")
        .bind(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string())
        .bind(&job_id)
        .execute(db.queue.pool())
        .await
        .expect("Failed to mark running");

    // Still within its 300 second default deadline
    assert_eq!(worker.sweep_timeouts().await.expect("Failed to sweep"), 0);
    let record = db.queue.get_status(&job_id).await.unwrap();
    assert_eq!(*record.job().status(), JobStatus::Running);
}
