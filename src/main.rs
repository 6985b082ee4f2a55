use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tonic::transport::Channel;
use tracing_subscriber::EnvFilter;

use jobwire::auth::WorkerCredentials;
use jobwire::codec::encode_timestamp;
use jobwire::config::{
    CoordinatorConfig, DEFAULT_LOG_CHANNEL_CAPACITY, DEFAULT_MAX_LOG_ENTRIES_PER_JOB,
};
use jobwire::coordinator::Coordinator;
use jobwire::proto::build_log_client::BuildLogClient;
use jobwire::proto::workflow_queue_client::WorkflowQueueClient;
use jobwire::proto::{BuildLogLine, JobResult, WorkflowLogLine};
use jobwire::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "jobwire")]
#[command(version)]
#[command(about = "Job result and log ingestion coordinator for remote workers")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the coordinator
    Server(ServerArgs),

    /// Act as a worker against a running coordinator
    Worker {
        #[command(flatten)]
        client: ClientArgs,

        #[command(subcommand)]
        command: WorkerCommands,
    },
}

#[derive(Parser, Debug)]
struct ServerArgs {
    /// Address to listen on for gRPC
    #[arg(long, default_value = "0.0.0.0:50051")]
    listen: SocketAddr,

    /// JSON seed file with projects, node runs, workers and jobs
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Buffered messages per open log stream
    #[arg(long, default_value_t = DEFAULT_LOG_CHANNEL_CAPACITY)]
    log_channel_capacity: usize,

    /// Maximum stored log lines per job
    #[arg(long, default_value_t = DEFAULT_MAX_LOG_ENTRIES_PER_JOB)]
    max_log_entries: usize,
}

#[derive(Parser, Debug)]
struct ClientArgs {
    /// Coordinator address
    #[arg(long, short = 'a', default_value = "http://127.0.0.1:50051")]
    addr: String,

    /// Worker name sent as x-worker-name
    #[arg(long, env = "JOBWIRE_WORKER_NAME")]
    name: String,

    /// Session token sent as x-worker-session
    #[arg(long, env = "JOBWIRE_WORKER_SESSION")]
    session: String,
}

#[derive(clap::Subcommand, Debug)]
enum WorkerCommands {
    /// Report the terminal result of a job
    SendResult {
        job_id: i64,
        /// Success, Fail or Stopped
        status: String,
        /// Human readable run time, e.g. "1m30s"
        #[arg(long, default_value = "")]
        duration: String,
    },
    /// Stream stdin as workflow log lines
    SendLog {
        #[arg(long)]
        node_run_id: i64,
        #[arg(long)]
        job_id: i64,
        #[arg(long, default_value = "0")]
        step: i32,
    },
    /// Stream stdin as legacy build log lines
    BuildLog {
        #[arg(long)]
        build_id: i64,
        #[arg(long)]
        job_id: i64,
        #[arg(long, default_value = "0")]
        step: i32,
    },
}

async fn run_server(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = CoordinatorConfig::new(args.listen)
        .with_log_channel_capacity(args.log_channel_capacity)
        .with_max_log_entries_per_job(args.max_log_entries);
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    tracing::info!(
        listen_addr = %config.listen_addr,
        seed = ?config.seed_path,
        log_channel_capacity = config.log_channel_capacity,
        "Starting jobwire"
    );

    let shutdown = install_shutdown_handler()?;
    Coordinator::new(config).run(shutdown).await?;
    Ok(())
}

async fn read_stdin_lines() -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = Vec::new();
    while let Some(line) = lines.next_line().await? {
        out.push(format!("{}\n", line));
    }
    Ok(out)
}

async fn run_worker(
    client: ClientArgs,
    command: WorkerCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    let channel = Channel::from_shared(client.addr)?.connect().await?;
    let credentials = WorkerCredentials::new(&client.name, &client.session)?;

    match command {
        WorkerCommands::SendResult {
            job_id,
            status,
            duration,
        } => {
            let mut queue = WorkflowQueueClient::with_interceptor(channel, credentials);
            queue
                .send_result(JobResult {
                    build_id: job_id,
                    status,
                    duration,
                    remote_time: Some(encode_timestamp(&Utc::now())),
                })
                .await?;
            println!("Result of job {} accepted", job_id);
        }
        WorkerCommands::SendLog {
            node_run_id,
            job_id,
            step,
        } => {
            let now = Some(encode_timestamp(&Utc::now()));
            let lines: Vec<WorkflowLogLine> = read_stdin_lines()
                .await?
                .into_iter()
                .map(|val| WorkflowLogLine {
                    workflow_node_run_id: node_run_id,
                    workflow_node_job_run_id: job_id,
                    step_order: step,
                    val,
                    start: now.clone(),
                    last_modified: now.clone(),
                    done: None,
                })
                .collect();
            let count = lines.len();
            let mut queue = WorkflowQueueClient::with_interceptor(channel, credentials);
            queue.send_log(tokio_stream::iter(lines)).await?;
            println!("Sent {} log lines for job {}", count, job_id);
        }
        WorkerCommands::BuildLog {
            build_id,
            job_id,
            step,
        } => {
            let now = Some(encode_timestamp(&Utc::now()));
            let lines: Vec<BuildLogLine> = read_stdin_lines()
                .await?
                .into_iter()
                .map(|val| BuildLogLine {
                    pipeline_build_id: build_id,
                    pipeline_build_job_id: job_id,
                    step_order: step,
                    val,
                    start: now.clone(),
                    last_modified: now.clone(),
                    done: None,
                })
                .collect();
            let count = lines.len();
            let mut build_log = BuildLogClient::with_interceptor(channel, credentials);
            build_log.add_build_log(tokio_stream::iter(lines)).await?;
            println!("Sent {} build log lines for job {}", count, job_id);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Server(server_args) => run_server(server_args).await,
        Commands::Worker { client, command } => {
            if let Err(e) = run_worker(client, command).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
