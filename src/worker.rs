use std::fmt::Debug;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::job::Job;
use crate::migrate::migrate;
use crate::registry::{Resolver, TaskRegistry};
use crate::sql::complete_job::complete_job;
use crate::sql::fail_job::fail_job;
use crate::sql::get_job::{cancel_blocked_jobs, get_job};
use crate::sql::timeout_jobs::sweep_timed_out_jobs;
use crate::utils::default_worker_id;

/// Default sleep between polls when no job is eligible.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A worker claims eligible jobs one at a time, executes them and records
/// the outcome. Parallelism comes from running several workers (threads or
/// OS processes) against the same database file; workers share no in-memory
/// state.
#[derive(Getters)]
#[getset(get = "pub")]
pub struct Worker {
    /// Identity recorded on every claim; defaults to `host:pid`.
    worker_id: String,
    /// How long to sleep when no job is eligible.
    poll_interval: Duration,
    #[getset(skip)]
    pool: SqlitePool,
    #[getset(skip)]
    resolver: Arc<dyn Resolver>,
    #[getset(skip)]
    stop_requested: Arc<AtomicBool>,
    #[getset(skip)]
    stop_notify: Arc<Notify>,
}

#[derive(Error, Debug)]
enum RunJobError {
    #[error("cannot resolve function identifier '{0}'")]
    ResolveFailure(String),
    #[error("job execution did not complete: {0}")]
    Panic(#[from] tokio::task::JoinError),
    #[error("{0}")]
    Failed(String),
}

impl Worker {
    /// Creates a new `WorkerOptions` builder with default settings.
    pub fn options() -> WorkerOptions {
        WorkerOptions::default()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs the claim loop until [`stop`](Worker::stop) is called.
    ///
    /// Store errors do not end the loop; they are logged and the iteration
    /// is retried after the polling interval.
    pub async fn run(&self) -> Result<()> {
        info!(worker_id = %self.worker_id, "Worker started");

        while !self.stop_requested.load(Ordering::SeqCst) {
            match self.run_once().await {
                Ok(true) => continue,
                Ok(false) => self.sleep_for_poll().await,
                Err(e) => {
                    error!(error = %e, "Worker iteration failed");
                    self.sleep_for_poll().await;
                }
            }
        }

        info!(worker_id = %self.worker_id, "Worker stopped");
        Ok(())
    }

    /// Requests a cooperative stop: the loop exits after finishing any
    /// in-progress job. Safe to call from another task or thread.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.stop_notify.notify_waiters();
    }

    /// One iteration of the claim loop: sweep expired jobs, then claim,
    /// execute and finalize at most one job. Returns whether a job was
    /// executed.
    pub async fn run_once(&self) -> Result<bool> {
        self.sweep_timeouts().await?;

        cancel_blocked_jobs(&self.pool).await?;

        let Some((job, execution_id)) = get_job(&self.pool, &self.worker_id).await? else {
            return Ok(false);
        };

        debug!(
            job_id = %job.id(),
            function_identifier = %job.function_identifier(),
            attempt = job.attempts(),
            "Claimed job"
        );

        let outcome = self.execute(&job).await;
        self.finalize(&job, &execution_id, outcome).await?;

        Ok(true)
    }

    /// Promotes expired `running` jobs back to `pending`, or to terminal
    /// `timeout` when their attempt budget is spent. Returns how many jobs
    /// were swept.
    pub async fn sweep_timeouts(&self) -> Result<u64> {
        let swept = sweep_timed_out_jobs(&self.pool).await?;
        if swept > 0 {
            warn!(swept, "Recovered timed out jobs");
        }
        Ok(swept)
    }

    /// Executes the job's function outside any transaction. A panic in user
    /// code is contained by the spawned task and reported as a failure.
    async fn execute(&self, job: &Job) -> std::result::Result<Value, RunJobError> {
        let task_fn = self
            .resolver
            .resolve(job.function_identifier())
            .ok_or_else(|| RunJobError::ResolveFailure(job.function_identifier().clone()))?;

        let task_fut = task_fn(job.parameters().0.clone());

        let value = tokio::spawn(task_fut)
            .await?
            .map_err(RunJobError::Failed)?;

        Ok(value)
    }

    async fn finalize(
        &self,
        job: &Job,
        execution_id: &str,
        outcome: std::result::Result<Value, RunJobError>,
    ) -> Result<()> {
        match outcome {
            Ok(value) => {
                let updated =
                    complete_job(&self.pool, job.id(), execution_id, &self.worker_id, &value)
                        .await?;
                if updated {
                    info!(job_id = %job.id(), "Completed job with success");
                } else {
                    debug!(
                        job_id = %job.id(),
                        "Job was reassigned before completion; result discarded"
                    );
                }
            }
            Err(e) => {
                let retry = job.attempts() < job.max_attempts();
                if retry {
                    warn!(job_id = %job.id(), error = %e, "Failed job, will retry");
                } else {
                    error!(job_id = %job.id(), error = %e, "Job max attempts reached");
                }

                let updated = fail_job(
                    &self.pool,
                    job.id(),
                    execution_id,
                    &self.worker_id,
                    &e.to_string(),
                    retry,
                )
                .await?;
                if !updated {
                    debug!(
                        job_id = %job.id(),
                        "Job was reassigned before failure could be recorded"
                    );
                }
            }
        }

        Ok(())
    }

    async fn sleep_for_poll(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => {}
            _ = self.stop_notify.notified() => {}
        }
    }
}

/// Configuration builder for [`Worker`].
#[derive(Default)]
pub struct WorkerOptions {
    worker_id: Option<String>,
    poll_interval: Option<Duration>,
    pool: Option<SqlitePool>,
    database_path: Option<PathBuf>,
    registry: TaskRegistry,
    resolver: Option<Arc<dyn Resolver>>,
}

#[derive(Error, Debug)]
pub enum WorkerBuildError {
    #[error("Error occured while opening the database: {0}")]
    Connect(#[from] crate::errors::SqliteWorkerError),
    #[error("Missing database_path config")]
    MissingDatabasePath,
}

impl WorkerOptions {
    /// Connects (unless a pool was supplied), migrates the schema and builds
    /// the worker.
    pub async fn init(self) -> std::result::Result<Worker, WorkerBuildError> {
        let pool = match self.pool {
            Some(pool) => pool,
            None => {
                let path = self
                    .database_path
                    .ok_or(WorkerBuildError::MissingDatabasePath)?;
                crate::db::connect(&path).await?
            }
        };

        migrate(&pool).await?;

        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(self.registry) as Arc<dyn Resolver>);

        Ok(Worker {
            worker_id: self.worker_id.unwrap_or_else(default_worker_id),
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            pool,
            resolver,
            stop_requested: Arc::new(AtomicBool::new(false)),
            stop_notify: Arc::new(Notify::new()),
        })
    }

    pub fn worker_id(mut self, value: impl Into<String>) -> Self {
        self.worker_id = Some(value.into());
        self
    }

    pub fn poll_interval(mut self, value: Duration) -> Self {
        self.poll_interval = Some(value);
        self
    }

    pub fn pool(mut self, value: SqlitePool) -> Self {
        self.pool = Some(value);
        self
    }

    pub fn database_path(mut self, value: impl Into<PathBuf>) -> Self {
        self.database_path = Some(value.into());
        self
    }

    /// Replaces the default registry-backed resolver entirely.
    pub fn resolver(mut self, value: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(value);
        self
    }

    /// Registers a job function under the given identifier on the worker's
    /// built-in registry.
    pub fn define_job<T, R, E, Fut, F>(mut self, identifier: &str, job_fn: F) -> Self
    where
        T: for<'de> Deserialize<'de> + Send,
        R: Serialize,
        E: Debug,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
    {
        self.registry.register(identifier, job_fn);
        self
    }
}
