use derive_builder::Builder;
use getset::Getters;
use serde_json::Value;

use crate::errors::{Result, SqliteWorkerError};

/// Description of a job to submit to the queue.
///
/// A `JobSpec` carries everything the queue persists about a unit of work:
/// the function identifier a worker resolves back to executable code, the
/// parameters passed to it, and the retry/timeout/ordering policy.
///
/// To create a JobSpec with fluent syntax, use the JobSpecBuilder:
///
/// ```
/// use sqlite_worker::JobSpec;
///
/// let spec = JobSpec::builder()
///     .name("nightly_report")
///     .function_identifier("reports.nightly")
///     .priority(10)
///     .max_attempts(5)
///     .timeout_seconds(600)
///     .build();
/// ```
#[derive(Getters, Debug, Clone, Builder)]
#[getset(get = "pub")]
#[builder(
    build_fn(private, name = "build_internal"),
    default,
    pattern = "owned"
)]
pub struct JobSpec {
    /// Human-readable name for listings and workflow maps.
    #[builder(setter(into))]
    name: String,

    /// Textual identifier of the function to execute.
    ///
    /// Workers hand this to their resolver to obtain the executable; it is
    /// the only representation of "what to run" that is ever persisted.
    #[builder(setter(into))]
    function_identifier: String,

    /// Parameters passed to the job function, as a JSON mapping.
    params: serde_json::Map<String, Value>,

    /// Higher numbers are claimed earlier. Default 0.
    priority: i32,

    /// Ids of jobs that must be completed before this job becomes eligible.
    ///
    /// Eligibility is evaluated lazily by workers; referencing an id that is
    /// never submitted keeps the job pending forever.
    dependencies: Vec<String>,

    /// Maximum number of attempts before the job is permanently failed.
    /// Default 3.
    max_attempts: i32,

    /// An attempt running longer than this is recovered by the timeout
    /// sweep. Default 300.
    timeout_seconds: i64,
}

impl Default for JobSpec {
    fn default() -> Self {
        JobSpec {
            name: String::new(),
            function_identifier: String::new(),
            params: serde_json::Map::new(),
            priority: 0,
            dependencies: Vec::new(),
            max_attempts: 3,
            timeout_seconds: 300,
        }
    }
}

impl JobSpec {
    /// Creates a job spec with the given name and function identifier and
    /// default policy (priority 0, 3 attempts, 300 second timeout).
    pub fn new(name: impl Into<String>, function_identifier: impl Into<String>) -> Self {
        JobSpec {
            name: name.into(),
            function_identifier: function_identifier.into(),
            ..Default::default()
        }
    }

    /// Creates a builder for constructing a JobSpec with a fluent API.
    pub fn builder() -> JobSpecBuilder {
        JobSpecBuilder::default()
    }

    /// Submit-time validation.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.function_identifier.is_empty() {
            return Err(SqliteWorkerError::InvalidJob(
                "function_identifier must not be empty".into(),
            ));
        }
        if self.max_attempts < 1 {
            return Err(SqliteWorkerError::InvalidJob(format!(
                "max_attempts must be at least 1, got {}",
                self.max_attempts
            )));
        }
        if self.timeout_seconds <= 0 {
            return Err(SqliteWorkerError::InvalidJob(format!(
                "timeout_seconds must be positive, got {}",
                self.timeout_seconds
            )));
        }
        Ok(())
    }

    pub(crate) fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

impl JobSpecBuilder {
    /// Creates a new instance of JobSpecBuilder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single named parameter, keeping previously added ones.
    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.into(), value);
        self
    }

    /// Builds the JobSpec from the current builder state.
    pub fn build(self) -> JobSpec {
        self.build_internal()
            .expect("There is a default value for all fields")
    }
}
