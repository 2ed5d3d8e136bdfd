use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

/// The lifecycle status of a job row.
///
/// `Completed`, `Failed`, `Cancelled` and `Timeout` are terminal: once a job
/// reaches one of them it is never mutated again, except by an explicit
/// requeue which resets it to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting to be claimed by a worker
    Pending,
    /// Claimed by a worker and currently executing
    Running,
    /// Finished successfully
    Completed,
    /// Exhausted its retry budget with an error
    Failed,
    /// Cancelled explicitly or because a dependency ended badly
    Cancelled,
    /// Exhausted its retry budget through the timeout sweep
    Timeout,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Timeout => "timeout",
        }
    }

    /// Whether this status ends the job's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::Timeout
        )
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            "timeout" => Ok(JobStatus::Timeout),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// The status of a single execution attempt.
///
/// An execution row is append-only: once its status leaves `Running` the row
/// is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Timeout,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Timeout => "timeout",
        }
    }
}

impl Display for ExecutionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `Job` represents a job as stored in the database.
///
/// Rows are created by queue submission and mutated only by the queue
/// (cancel/requeue/cleanup) or by workers (claim/finalize/timeout sweep).
#[derive(FromRow, Getters, Debug, Clone)]
#[getset(get = "pub")]
pub struct Job {
    /// Opaque 128-bit random identifier, textual
    id: String,
    /// Human-readable job name
    name: String,
    /// Textual identifier resolved back to executable code by a resolver
    function_identifier: String,
    /// JSON mapping of parameter name to value, passed to the job function
    parameters: Json<serde_json::Map<String, Value>>,
    /// Higher numbers are claimed earlier
    priority: i32,
    /// Ids of jobs that must complete before this one becomes eligible
    dependencies: Json<Vec<String>>,
    /// The limit for the number of times this job may be attempted
    max_attempts: i32,
    /// How many times this job has been attempted
    attempts: i32,
    /// Running longer than this marks the attempt as timed out
    timeout_seconds: i64,
    status: JobStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// When the current (or last) attempt started
    started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status
    completed_at: Option<DateTime<Utc>>,
    /// Identity of the worker holding the claim, if running
    worker_id: Option<String>,
    /// JSON value returned by a successful execution
    result: Option<Json<Value>>,
    /// Last error message, if any attempt failed
    error: Option<String>,
    /// Tag shared by all jobs submitted from the same workflow
    executing_workflow_id: Option<String>,
}

/// One execution attempt of a job.
///
/// A job accumulates one row here per attempt; the rows form its audit trail.
#[derive(FromRow, Getters, Debug, Clone)]
#[getset(get = "pub")]
pub struct JobExecution {
    id: String,
    job_id: String,
    worker_id: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    status: ExecutionStatus,
    result: Option<Json<Value>>,
    error: Option<String>,
}
