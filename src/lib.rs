//! A lightweight, local-first job queue backed by SQLite.
//!
//! Jobs are persisted durably and executed by one or more workers, across
//! threads or OS processes, that coordinate exclusively through the
//! database file. The queue guarantees at-most-once dispatch of a job per
//! attempt, bounded retries, sweep-based timeout recovery that survives
//! worker crashes, and dependency-aware scheduling for workflow DAGs.
//!
//! ```no_run
//! use serde::Deserialize;
//! use serde_json::json;
//! use sqlite_worker::{JobSpec, Queue, Worker};
//!
//! #[derive(Deserialize)]
//! struct Greet {
//!     name: String,
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = Queue::open("jobs.db").await?;
//! queue
//!     .submit(&JobSpec::builder()
//!         .name("greet_alice")
//!         .function_identifier("greetings.say_hello")
//!         .param("name", json!("alice"))
//!         .build())
//!     .await?;
//!
//! let worker = Worker::options()
//!     .database_path("jobs.db")
//!     .define_job("greetings.say_hello", |params: Greet| async move {
//!         Ok::<_, String>(json!({ "greeted": params.name }))
//!     })
//!     .init()
//!     .await?;
//! worker.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod errors;
mod job;
mod job_spec;
pub mod migrate;
mod queue;
mod registry;
mod sql;
mod utils;
mod worker;
mod workflow;

pub use errors::{Result, SqliteWorkerError};
pub use job::{ExecutionStatus, Job, JobExecution, JobStatus};
pub use job_spec::{JobSpec, JobSpecBuilder};
pub use queue::{JobFilter, JobStatusRecord, Queue};
pub use registry::{JobFn, JobFuture, JobOutcome, Resolver, TaskRegistry};
pub use worker::{Worker, WorkerBuildError, WorkerOptions};
pub use workflow::{Workflow, WorkflowError};
