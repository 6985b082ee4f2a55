use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

use crate::auth::{SessionRegistry, WorkerAuthInterceptor};
use crate::error::{CoordinatorError, Result};
use crate::grpc::{BuildLogService, WorkflowQueueService};
use crate::proto::build_log_server::BuildLogServer;
use crate::proto::workflow_queue_server::WorkflowQueueServer;

pub struct GrpcServer {
    addr: SocketAddr,
    sessions: SessionRegistry,
    build_log: BuildLogService,
    workflow_queue: WorkflowQueueService,
}

impl GrpcServer {
    pub fn new(
        addr: SocketAddr,
        sessions: SessionRegistry,
        build_log: BuildLogService,
        workflow_queue: WorkflowQueueService,
    ) -> Self {
        Self {
            addr,
            sessions,
            build_log,
            workflow_queue,
        }
    }

    /// Bind the configured address and serve until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| CoordinatorError::Internal(format!("cannot bind {}: {}", self.addr, e)))?;
        self.serve_with_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener. Tests bind `127.0.0.1:0` and pass
    /// the listener in to learn the port up front.
    pub async fn serve_with_listener(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let local_addr = listener.local_addr().ok();
        let interceptor = WorkerAuthInterceptor::new(self.sessions);

        tracing::info!(addr = ?local_addr, "Starting gRPC server");

        Server::builder()
            .add_service(BuildLogServer::with_interceptor(
                self.build_log,
                interceptor.clone(),
            ))
            .add_service(WorkflowQueueServer::with_interceptor(
                self.workflow_queue,
                interceptor,
            ))
            .serve_with_incoming_shutdown(
                TcpListenerStream::new(listener),
                async move { shutdown.cancelled().await },
            )
            .await?;

        tracing::info!("gRPC server stopped");
        Ok(())
    }
}
