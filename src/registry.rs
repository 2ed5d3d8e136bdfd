use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one execution of a job function: a serialized return value on
/// success, an error message on failure.
pub type JobOutcome = Result<Value, String>;

/// A boxed future produced by a job function.
pub type JobFuture = Pin<Box<dyn Future<Output = JobOutcome> + Send>>;

/// A type-erased, shareable job function taking the job's parameter mapping.
pub type JobFn = Arc<dyn Fn(serde_json::Map<String, Value>) -> JobFuture + Send + Sync>;

/// Maps a persisted function identifier back to an executable.
///
/// Workers treat the resolver as fallible: a `None` is recorded as the job's
/// error and counts as a regular failure, subject to the retry policy.
pub trait Resolver: Send + Sync {
    fn resolve(&self, function_identifier: &str) -> Option<JobFn>;
}

/// The default resolver: an in-memory table of registered job functions.
///
/// ```
/// use sqlite_worker::TaskRegistry;
/// use serde::Deserialize;
/// use serde_json::json;
///
/// #[derive(Deserialize)]
/// struct Resize { width: u32 }
///
/// let mut registry = TaskRegistry::new();
/// registry.register("images.resize", |params: Resize| async move {
///     Ok::<_, String>(json!({ "width": params.width }))
/// });
/// ```
#[derive(Default, Clone)]
pub struct TaskRegistry {
    tasks: HashMap<String, JobFn>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Registers a job function under the given identifier.
    ///
    /// The function receives its parameters deserialized into `T` and returns
    /// any serializable value. Deserialization and serialization errors are
    /// reported as execution failures.
    pub fn register<T, R, E, Fut, F>(&mut self, identifier: &str, job_fn: F) -> &mut Self
    where
        T: for<'de> Deserialize<'de> + Send,
        R: Serialize,
        E: Debug,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
    {
        let job_fn = Arc::new(job_fn);
        let erased = move |params: serde_json::Map<String, Value>| {
            let job_fn = job_fn.clone();
            async move {
                let de_params = serde_json::from_value(Value::Object(params));

                match de_params {
                    Err(e) => Err(format!("{e:?}")),
                    Ok(p) => match job_fn(p).await {
                        Err(e) => Err(format!("{e:?}")),
                        Ok(v) => serde_json::to_value(v).map_err(|e| format!("{e:?}")),
                    },
                }
            }
            .boxed()
        };

        self.tasks.insert(identifier.to_string(), Arc::new(erased));
        self
    }
}

impl Resolver for TaskRegistry {
    fn resolve(&self, function_identifier: &str) -> Option<JobFn> {
        self.tasks.get(function_identifier).cloned()
    }
}
