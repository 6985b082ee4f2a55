use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::auth::SessionRegistry;
use crate::config::CoordinatorConfig;
use crate::error::Result;
use crate::grpc::{BuildLogService, GrpcServer, WorkflowQueueService};
use crate::model::{BuildLogLine, WorkflowLogLine};
use crate::queue::ResultProcessor;
use crate::store::seed::SeedData;
use crate::store::{MemoryDatabase, MemoryLogStore, Stores};

/// Owns the stores and sessions behind the worker-facing gRPC services.
pub struct Coordinator {
    pub config: CoordinatorConfig,
    pub database: Arc<MemoryDatabase>,
    pub build_logs: Arc<MemoryLogStore<BuildLogLine>>,
    pub workflow_logs: Arc<MemoryLogStore<WorkflowLogLine>>,
    pub sessions: SessionRegistry,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        let limit = config.max_log_entries_per_job;
        Self {
            config,
            database: Arc::new(MemoryDatabase::new()),
            build_logs: Arc::new(MemoryLogStore::with_capacity(limit)),
            workflow_logs: Arc::new(MemoryLogStore::with_capacity(limit)),
            sessions: SessionRegistry::new(),
        }
    }

    /// Load the configured seed file, if any.
    pub async fn load_seed(&self) -> Result<()> {
        let Some(path) = &self.config.seed_path else {
            return Ok(());
        };
        let seed = SeedData::from_file(path).await?;
        tracing::info!(
            path = %path.display(),
            projects = seed.projects.len(),
            workers = seed.workers.len(),
            jobs = seed.jobs.len(),
            "Loaded seed data"
        );
        seed.apply(&self.database, &self.sessions).await
    }

    pub fn result_processor(&self) -> ResultProcessor {
        ResultProcessor::new(Stores::memory(self.database.clone()))
    }

    pub fn grpc_server(&self) -> GrpcServer {
        let capacity = self.config.log_channel_capacity;
        GrpcServer::new(
            self.config.listen_addr,
            self.sessions.clone(),
            BuildLogService::new(self.build_logs.clone(), capacity),
            WorkflowQueueService::new(self.workflow_logs.clone(), self.result_processor(), capacity),
        )
    }

    /// Load the seed and serve on the configured address until `shutdown`
    /// is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        self.load_seed().await?;
        tracing::info!(listen_addr = %self.config.listen_addr, "Starting jobwire coordinator");
        self.grpc_server().run(shutdown).await
    }

    /// Serve on an already bound listener. The seed is not reloaded.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        self.grpc_server()
            .serve_with_listener(listener, shutdown)
            .await
    }
}
