use std::time::Duration;

use serde_json::{json, Value};
use sqlite_worker::{JobSpec, JobStatus};
use tokio::time::sleep;

mod helpers;

#[tokio::test]
async fn higher_priority_jobs_are_claimed_first() {
    let db = helpers::create_test_db().await;

    let worker = db
        .create_worker_options()
        .define_job("tests.step", |_: Value| async move {
            Ok::<_, String>(json!(null))
        })
        .init()
        .await
        .expect("Failed to init worker");

    let low_id = db
        .queue
        .submit(
            &JobSpec::builder()
                .name("low")
                .function_identifier("tests.step")
                .priority(1)
                .build(),
        )
        .await
        .expect("Failed to submit");
    let high_id = db
        .queue
        .submit(
            &JobSpec::builder()
                .name("high")
                .function_identifier("tests.step")
                .priority(5)
                .build(),
        )
        .await
        .expect("Failed to submit");

    assert!(worker.run_once().await.expect("Failed to run worker"));

    let high = db.queue.get_status(&high_id).await.unwrap();
    let low = db.queue.get_status(&low_id).await.unwrap();
    assert_eq!(*high.job().status(), JobStatus::Completed);
    assert_eq!(*low.job().status(), JobStatus::Pending);
}

#[tokio::test]
async fn equal_priority_is_broken_by_submission_time() {
    let db = helpers::create_test_db().await;

    let worker = db
        .create_worker_options()
        .define_job("tests.step", |_: Value| async move {
            Ok::<_, String>(json!(null))
        })
        .init()
        .await
        .expect("Failed to init worker");

    let first_id = db
        .queue
        .submit(&JobSpec::new("first", "tests.step"))
        .await
        .expect("Failed to submit");
    sleep(Duration::from_millis(2)).await;
    let second_id = db
        .queue
        .submit(&JobSpec::new("second", "tests.step"))
        .await
        .expect("Failed to submit");

    assert!(worker.run_once().await.expect("Failed to run worker"));

    let first = db.queue.get_status(&first_id).await.unwrap();
    let second = db.queue.get_status(&second_id).await.unwrap();
    assert_eq!(*first.job().status(), JobStatus::Completed);
    assert_eq!(*second.job().status(), JobStatus::Pending);
}
