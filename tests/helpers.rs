#![allow(dead_code)]

use std::time::Duration;

use sqlite_worker::{Queue, Worker, WorkerOptions};
use tokio::sync::{Mutex, OnceCell};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// A queue backed by a fresh database file in a private temp directory.
/// The caller must hold the struct so the directory outlives the test.
pub struct TestDb {
    pub queue: Queue,
    _tmp: tempfile::TempDir,
}

pub async fn create_test_db() -> TestDb {
    let tmp = tempfile::tempdir().expect("tempdir should be created");
    let queue = Queue::open(tmp.path().join("jobs.db"))
        .await
        .expect("Failed to open queue");

    TestDb { queue, _tmp: tmp }
}

impl TestDb {
    /// Worker options bound to this database, with a fast poll for tests.
    pub fn create_worker_options(&self) -> WorkerOptions {
        Worker::options()
            .pool(self.queue.pool().clone())
            .poll_interval(Duration::from_millis(50))
    }
}

pub struct StaticCounter {
    cell: OnceCell<Mutex<u32>>,
}

async fn init_job_count() -> Mutex<u32> {
    Mutex::new(0)
}

impl StaticCounter {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    pub async fn increment(&self) -> u32 {
        let cell = self.cell.get_or_init(init_job_count).await;
        let mut count = cell.lock().await;
        *count += 1;
        *count
    }

    pub async fn get(&self) -> u32 {
        let cell = self.cell.get_or_init(init_job_count).await;
        *cell.lock().await
    }
}

pub async fn enable_logs() {
    static ONCE: OnceCell<()> = OnceCell::const_new();

    ONCE.get_or_init(|| async {
        let fmt_layer = tracing_subscriber::fmt::layer();
        // Log level set to debug except for sqlx set at warn (to not show all sql requests)
        let filter_layer = EnvFilter::try_new("debug,sqlx=warn").unwrap();

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .init();
    })
    .await;
}
