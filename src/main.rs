use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;
use sqlite_worker::{
    JobFilter, JobSpec, JobStatus, Queue, SqliteWorkerError, Worker, WorkerBuildError,
};
use tracing_subscriber::EnvFilter;

/// Lightweight SQLite-backed job queue.
#[derive(Parser, Debug)]
#[command(name = "sqlite-worker", version, about, long_about = None)]
struct Cli {
    /// Path to the queue database
    #[arg(long = "db", global = true, default_value = "jobs.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a job
    Submit {
        /// Function identifier resolved by the executing worker
        function_identifier: String,

        /// Job name (defaults to the function identifier)
        #[arg(long)]
        name: Option<String>,

        /// Job parameter as KEY=VALUE; VALUE is parsed as JSON when possible
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Higher numbers are claimed earlier
        #[arg(long, default_value_t = 0)]
        priority: i32,

        /// Maximum number of attempts
        #[arg(long, default_value_t = 3)]
        max_attempts: i32,

        /// Timeout in seconds per attempt
        #[arg(long, default_value_t = 300)]
        timeout: i64,

        /// Id of a job that must complete first (repeatable)
        #[arg(long = "depends-on", value_name = "ID")]
        depends_on: Vec<String>,
    },

    /// List jobs
    List {
        /// Only jobs in this status
        #[arg(long)]
        status: Option<String>,

        /// Only jobs from this workflow
        #[arg(long)]
        workflow: Option<String>,

        /// At most this many rows
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Show a job and its execution history
    Status {
        job_id: String,

        /// Also print the job's result value
        #[arg(long)]
        show_result: bool,
    },

    /// Cancel a pending or failed job
    Cancel { job_id: String },

    /// Requeue a failed, cancelled or timed out job
    Requeue { job_id: String },

    /// Run a worker until interrupted
    Worker {
        /// Worker identity (defaults to host:pid)
        #[arg(long)]
        id: Option<String>,

        /// Process at most one job, then exit
        #[arg(long)]
        once: bool,

        /// Polling interval in seconds
        #[arg(long, default_value_t = 5)]
        poll: u64,
    },

    /// Delete terminal jobs older than a cutoff
    Clear {
        /// Age cutoff in days
        #[arg(long, default_value_t = 7)]
        before: u32,
    },
}

const EXIT_USAGE: i32 = 1;
const EXIT_NOT_FOUND: i32 = 2;
const EXIT_CONFLICT: i32 = 3;
const EXIT_STORE: i32 = 4;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(EXIT_USAGE);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        let code = match e {
            SqliteWorkerError::NotFound(_) => EXIT_NOT_FOUND,
            SqliteWorkerError::Conflict { .. } => EXIT_CONFLICT,
            SqliteWorkerError::InvalidJob(_) => EXIT_USAGE,
            _ => EXIT_STORE,
        };
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<(), SqliteWorkerError> {
    match cli.command {
        Command::Submit {
            function_identifier,
            name,
            params,
            priority,
            max_attempts,
            timeout,
            depends_on,
        } => {
            let queue = Queue::open(&cli.db).await?;
            let mut builder = JobSpec::builder()
                .name(name.unwrap_or_else(|| function_identifier.clone()))
                .function_identifier(function_identifier)
                .priority(priority)
                .max_attempts(max_attempts)
                .timeout_seconds(timeout)
                .dependencies(depends_on);
            for param in params {
                let (key, value) = parse_param(&param)?;
                builder = builder.param(key, value);
            }

            let job_id = queue.submit(&builder.build()).await?;
            println!("{job_id}");
        }

        Command::List {
            status,
            workflow,
            limit,
        } => {
            let status = status.map(|s| parse_status(&s)).transpose()?;
            let queue = Queue::open(&cli.db).await?;
            let jobs = queue
                .list(&JobFilter {
                    status,
                    workflow_id: workflow,
                    limit,
                })
                .await?;

            println!(
                "{:<36}  {:<20}  {:<9}  {:>8}  {}",
                "ID", "NAME", "STATUS", "ATTEMPTS", "CREATED"
            );
            for job in jobs {
                println!(
                    "{:<36}  {:<20}  {:<9}  {:>8}  {}",
                    job.id(),
                    truncate(job.name(), 20),
                    job.status(),
                    format!("{}/{}", job.attempts(), job.max_attempts()),
                    job.created_at().format("%Y-%m-%d %H:%M:%S"),
                );
            }
        }

        Command::Status {
            job_id,
            show_result,
        } => {
            let queue = Queue::open(&cli.db).await?;
            let record = queue.get_status(&job_id).await?;
            let job = record.job();

            println!("id:        {}", job.id());
            println!("name:      {}", job.name());
            println!("function:  {}", job.function_identifier());
            println!("status:    {}", job.status());
            println!("priority:  {}", job.priority());
            println!("attempts:  {}/{}", job.attempts(), job.max_attempts());
            println!("created:   {}", job.created_at());
            if let Some(worker_id) = job.worker_id() {
                println!("worker:    {worker_id}");
            }
            if let Some(error) = job.error() {
                println!("error:     {error}");
            }
            if show_result {
                if let Some(result) = job.result() {
                    println!("result:    {}", result.0);
                }
            }
            if !record.executions().is_empty() {
                println!("executions:");
                for execution in record.executions() {
                    println!(
                        "  {}  {}  started {}  worker {}",
                        execution.id(),
                        execution.status(),
                        execution.started_at(),
                        execution.worker_id(),
                    );
                }
            }
        }

        Command::Cancel { job_id } => {
            let queue = Queue::open(&cli.db).await?;
            let record = queue.get_status(&job_id).await?;
            if !queue.cancel(&job_id).await? {
                return Err(SqliteWorkerError::Conflict {
                    job_id,
                    status: *record.job().status(),
                    operation: "cancelled",
                });
            }
            println!("cancelled");
        }

        Command::Requeue { job_id } => {
            let queue = Queue::open(&cli.db).await?;
            let record = queue.get_status(&job_id).await?;
            if !queue.requeue(&job_id).await? {
                return Err(SqliteWorkerError::Conflict {
                    job_id,
                    status: *record.job().status(),
                    operation: "requeued",
                });
            }
            println!("requeued");
        }

        Command::Worker { id, once, poll } => {
            let mut options = Worker::options()
                .database_path(&cli.db)
                .poll_interval(Duration::from_secs(poll));
            if let Some(id) = id {
                options = options.worker_id(id);
            }
            let worker = Arc::new(options.init().await.map_err(build_error)?);

            if once {
                let executed = worker.run_once().await?;
                println!("{}", if executed { "executed one job" } else { "no job" });
            } else {
                let signal_target = worker.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        signal_target.stop();
                    }
                });
                worker.run().await?;
            }
        }

        Command::Clear { before } => {
            let queue = Queue::open(&cli.db).await?;
            let deleted = queue.cleanup(before).await?;
            println!("{deleted}");
        }
    }

    Ok(())
}

fn parse_param(raw: &str) -> Result<(String, Value), SqliteWorkerError> {
    let (key, value) = raw.split_once('=').ok_or_else(|| {
        SqliteWorkerError::InvalidJob(format!("parameter '{raw}' is not of the form KEY=VALUE"))
    })?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn parse_status(raw: &str) -> Result<JobStatus, SqliteWorkerError> {
    raw.parse()
        .map_err(|e: String| SqliteWorkerError::InvalidJob(e))
}

fn build_error(e: WorkerBuildError) -> SqliteWorkerError {
    match e {
        WorkerBuildError::Connect(inner) => inner,
        WorkerBuildError::MissingDatabasePath => {
            SqliteWorkerError::InvalidJob("missing database path".into())
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
