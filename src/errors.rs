use thiserror::Error;

use crate::job::JobStatus;

/// Errors that can occur during queue and worker operations.
///
/// This enum represents the various errors that can occur when interacting
/// with the job queue database or managing job state.
#[derive(Error, Debug)]
pub enum SqliteWorkerError {
    /// An error occurred while executing an SQL query
    #[error("Error occured while query: {0}")]
    Store(#[from] sqlx::Error),

    /// An error occurred while serializing or deserializing JSON data
    #[error("Error while serializing value: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A job failed validation at submit time
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// Lookup of an unknown job id
    #[error("No job found with id '{0}'")]
    NotFound(String),

    /// A state transition not permitted by the job's current status
    #[error("Job '{job_id}' is {status} and cannot be {operation}")]
    Conflict {
        job_id: String,
        status: JobStatus,
        operation: &'static str,
    },
}

/// A Result type alias for SqliteWorkerError.
pub type Result<T> = core::result::Result<T, SqliteWorkerError>;
