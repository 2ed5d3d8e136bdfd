pub(crate) mod add_job;
pub(crate) mod complete_job;
pub(crate) mod fail_job;
pub(crate) mod get_job;
pub(crate) mod queue_ops;
pub(crate) mod timeout_jobs;
