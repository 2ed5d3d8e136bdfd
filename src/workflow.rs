use std::collections::HashMap;

use getset::Getters;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::errors::SqliteWorkerError;
use crate::job_spec::JobSpec;
use crate::queue::Queue;

/// Errors raised while building or submitting a workflow. Construction
/// errors never reach the store.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Job '{job}' depends on '{dependency}', which is not part of this workflow")]
    UnknownDependency { job: String, dependency: String },

    #[error("A job named '{0}' was already added to this workflow")]
    DuplicateJob(String),

    #[error("The workflow dependency graph contains a cycle")]
    CycleDetected,

    #[error(transparent)]
    Queue(#[from] SqliteWorkerError),
}

struct WorkflowEntry {
    spec: JobSpec,
    depends_on: Vec<usize>,
}

/// An in-memory builder for a group of jobs forming a dependency DAG.
///
/// Jobs are referenced by name within the workflow; `submit_all` assigns
/// ids in topological order, rewrites each job's dependency list to those
/// ids and inserts the whole batch tagged with the workflow's id.
///
/// ```no_run
/// # use sqlite_worker::{JobSpec, Queue, Workflow};
/// # async fn example(queue: &Queue) -> Result<(), Box<dyn std::error::Error>> {
/// let mut workflow = Workflow::new("etl");
/// workflow.add_job(JobSpec::new("download", "etl.download"), &[])?;
/// workflow.add_job(JobSpec::new("process", "etl.process"), &["download"])?;
/// workflow.add_job(JobSpec::new("analyze", "etl.analyze"), &["process"])?;
/// let ids = workflow.submit_all(queue).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Getters)]
pub struct Workflow {
    /// Opaque id tagging every job submitted from this workflow.
    #[getset(get = "pub")]
    id: String,
    /// Human-readable workflow name.
    #[getset(get = "pub")]
    name: String,
    entries: Vec<WorkflowEntry>,
    index_by_name: HashMap<String, usize>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Workflow {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            entries: Vec::new(),
            index_by_name: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a job, depending on previously added jobs named in
    /// `depends_on`.
    pub fn add_job(&mut self, spec: JobSpec, depends_on: &[&str]) -> Result<(), WorkflowError> {
        let name = spec.name().clone();
        if self.index_by_name.contains_key(&name) {
            return Err(WorkflowError::DuplicateJob(name));
        }

        let mut dep_indexes = Vec::with_capacity(depends_on.len());
        for dep in depends_on {
            let index =
                self.index_by_name
                    .get(*dep)
                    .ok_or_else(|| WorkflowError::UnknownDependency {
                        job: name.clone(),
                        dependency: (*dep).to_string(),
                    })?;
            dep_indexes.push(*index);
        }

        self.index_by_name.insert(name, self.entries.len());
        self.entries.push(WorkflowEntry {
            spec,
            depends_on: dep_indexes,
        });

        Ok(())
    }

    /// Submits every job in the workflow in one batch and returns the
    /// assigned ids keyed by job name.
    ///
    /// Ids are assigned in topological order and each job's dependency list
    /// is extended with the ids of the workflow jobs it depends on.
    pub async fn submit_all(&self, queue: &Queue) -> Result<HashMap<String, String>, WorkflowError> {
        let order = self.topological_order()?;

        let mut assigned_ids: Vec<Option<String>> = vec![None; self.entries.len()];
        let mut batch = Vec::with_capacity(self.entries.len());
        for index in order {
            let entry = &self.entries[index];
            let id = Uuid::new_v4().to_string();

            let mut dependencies = entry.spec.dependencies().clone();
            for dep_index in &entry.depends_on {
                let dep_id = assigned_ids[*dep_index]
                    .as_ref()
                    .expect("dependencies precede their dependents in topological order");
                dependencies.push(dep_id.clone());
            }

            assigned_ids[index] = Some(id.clone());
            batch.push((id, entry.spec.clone().with_dependencies(dependencies)));
        }

        queue.submit_batch(&batch, &self.id).await?;

        info!(
            workflow_id = %self.id,
            workflow = %self.name,
            jobs = batch.len(),
            "Workflow submitted"
        );

        let ids = self
            .index_by_name
            .iter()
            .map(|(name, index)| {
                let id = assigned_ids[*index]
                    .clone()
                    .expect("every entry is assigned an id");
                (name.clone(), id)
            })
            .collect();

        Ok(ids)
    }

    /// Kahn's algorithm over the internal dependency edges.
    fn topological_order(&self) -> Result<Vec<usize>, WorkflowError> {
        let mut in_degree = vec![0usize; self.entries.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.entries.len()];

        for (index, entry) in self.entries.iter().enumerate() {
            in_degree[index] = entry.depends_on.len();
            for dep in &entry.depends_on {
                dependents[*dep].push(index);
            }
        }

        let mut ready: Vec<usize> = (0..self.entries.len())
            .filter(|i| in_degree[*i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.entries.len());

        while let Some(index) = ready.pop() {
            order.push(index);
            for dependent in &dependents[index] {
                in_degree[*dependent] -= 1;
                if in_degree[*dependent] == 0 {
                    ready.push(*dependent);
                }
            }
        }

        if order.len() != self.entries.len() {
            return Err(WorkflowError::CycleDetected);
        }

        Ok(order)
    }
}

#[cfg(test)]
impl Workflow {
    /// Test-only: wire a dependency edge without `add_job`'s
    /// already-added constraint, so cycle detection can be exercised.
    fn add_edge(&mut self, job: &str, depends_on: &str) {
        let job_index = self.index_by_name[job];
        let dep_index = self.index_by_name[depends_on];
        self.entries[job_index].depends_on.push(dep_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::JobFilter;

    #[test]
    fn dependencies_must_already_be_in_the_workflow() {
        let mut workflow = Workflow::new("test");
        workflow
            .add_job(JobSpec::new("first", "tasks.first"), &[])
            .unwrap();

        let err = workflow
            .add_job(JobSpec::new("second", "tasks.second"), &["missing"])
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownDependency { .. }));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut workflow = Workflow::new("test");
        workflow
            .add_job(JobSpec::new("first", "tasks.first"), &[])
            .unwrap();

        let err = workflow
            .add_job(JobSpec::new("first", "tasks.other"), &[])
            .unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateJob(_)));
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let mut workflow = Workflow::new("diamond");
        workflow.add_job(JobSpec::new("a", "t.a"), &[]).unwrap();
        workflow.add_job(JobSpec::new("b", "t.b"), &["a"]).unwrap();
        workflow.add_job(JobSpec::new("c", "t.c"), &["a"]).unwrap();
        workflow
            .add_job(JobSpec::new("d", "t.d"), &["b", "c"])
            .unwrap();

        let order = workflow.topological_order().unwrap();
        let position =
            |name: &str| order.iter().position(|i| *i == workflow.index_by_name[name]);
        assert!(position("a") < position("b"));
        assert!(position("a") < position("c"));
        assert!(position("b") < position("d"));
        assert!(position("c") < position("d"));
    }

    #[test]
    fn workflows_have_distinct_ids() {
        assert_ne!(Workflow::new("one").id(), Workflow::new("two").id());
    }

    #[tokio::test]
    async fn submit_all_rejects_cycles() {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        let queue = Queue::open(tmp.path().join("jobs.db"))
            .await
            .expect("Failed to open queue");

        let mut workflow = Workflow::new("cyclic");
        workflow.add_job(JobSpec::new("a", "t.a"), &[]).unwrap();
        workflow.add_job(JobSpec::new("b", "t.b"), &["a"]).unwrap();
        // Close the loop behind add_job's back
        workflow.add_edge("a", "b");

        let err = workflow.submit_all(&queue).await.unwrap_err();
        assert!(matches!(err, WorkflowError::CycleDetected));

        // Nothing reached the store
        let jobs = queue.list(&JobFilter::default()).await.unwrap();
        assert!(jobs.is_empty());
    }
}
