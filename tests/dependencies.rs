use serde_json::{json, Value};
use sqlite_worker::{JobSpec, JobStatus};

mod helpers;

#[tokio::test]
async fn dependent_job_waits_for_its_dependency() {
    let db = helpers::create_test_db().await;

    let worker = db
        .create_worker_options()
        .define_job("tests.step", |_: Value| async move {
            Ok::<_, String>(json!(null))
        })
        .init()
        .await
        .expect("Failed to init worker");

    let a_id = db
        .queue
        .submit(&JobSpec::new("step_a", "tests.step"))
        .await
        .expect("Failed to submit");
    let b_id = db
        .queue
        .submit(
            &JobSpec::builder()
                .name("step_b")
                .function_identifier("tests.step")
                // Higher priority must not let the dependent jump the gate
                .priority(100)
                .dependencies(vec![a_id.clone()])
                .build(),
        )
        .await
        .expect("Failed to submit");

    // First iteration can only pick A, however low its priority
    assert!(worker.run_once().await.expect("Failed to run worker"));
    let a = db.queue.get_status(&a_id).await.unwrap();
    let b = db.queue.get_status(&b_id).await.unwrap();
    assert_eq!(*a.job().status(), JobStatus::Completed);
    assert_eq!(*b.job().status(), JobStatus::Pending);
    assert!(b.executions().is_empty());

    // Now B is eligible
    assert!(worker.run_once().await.expect("Failed to run worker"));
    let b = db.queue.get_status(&b_id).await.unwrap();
    assert_eq!(*b.job().status(), JobStatus::Completed);

    // B's attempt started only after A was done
    let a = db.queue.get_status(&a_id).await.unwrap();
    let a_done = a.job().completed_at().as_ref().expect("A should be done");
    assert!(a_done <= b.executions()[0].started_at());
}

#[tokio::test]
async fn dependent_of_a_failed_job_is_cancelled() {
    let db = helpers::create_test_db().await;

    let worker = db
        .create_worker_options()
        .define_job("tests.boom", |_: Value| async move {
            Err::<Value, _>("boom".to_string())
        })
        .define_job("tests.step", |_: Value| async move {
            Ok::<_, String>(json!(null))
        })
        .init()
        .await
        .expect("Failed to init worker");

    let a_id = db
        .queue
        .submit(
            &JobSpec::builder()
                .name("doomed")
                .function_identifier("tests.boom")
                .max_attempts(1)
                .build(),
        )
        .await
        .expect("Failed to submit");
    let b_id = db
        .queue
        .submit(
            &JobSpec::builder()
                .name("dependent")
                .function_identifier("tests.step")
                .dependencies(vec![a_id.clone()])
                .build(),
        )
        .await
        .expect("Failed to submit");

    // A fails terminally
    assert!(worker.run_once().await.expect("Failed to run worker"));
    let a = db.queue.get_status(&a_id).await.unwrap();
    assert_eq!(*a.job().status(), JobStatus::Failed);

    // The next iteration observes the dead dependency and cancels B
    assert!(!worker.run_once().await.expect("Failed to run worker"));
    let b = db.queue.get_status(&b_id).await.unwrap();
    assert_eq!(*b.job().status(), JobStatus::Cancelled);
    let error = b.job().error().clone().unwrap();
    assert!(error.contains(&a_id));
    assert!(error.contains("failed"));
    assert!(b.executions().is_empty());
}

#[tokio::test]
async fn missing_dependency_keeps_the_job_pending() {
    let db = helpers::create_test_db().await;

    let worker = db
        .create_worker_options()
        .define_job("tests.step", |_: Value| async move {
            Ok::<_, String>(json!(null))
        })
        .init()
        .await
        .expect("Failed to init worker");

    let job_id = db
        .queue
        .submit(
            &JobSpec::builder()
                .name("orphan")
                .function_identifier("tests.step")
                .dependencies(vec!["does-not-exist".to_string()])
                .build(),
        )
        .await
        .expect("Failed to submit");

    assert!(!worker.run_once().await.expect("Failed to run worker"));
    let record = db.queue.get_status(&job_id).await.unwrap();
    assert_eq!(*record.job().status(), JobStatus::Pending);
    assert_eq!(*record.job().attempts(), 0);
}
