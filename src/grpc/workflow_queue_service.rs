use std::sync::Arc;

use tonic::{Request, Response, Status, Streaming};

use crate::auth;
use crate::grpc::stream::ingest;
use crate::model::WorkflowLogLine;
use crate::proto;
use crate::proto::workflow_queue_server::WorkflowQueue;
use crate::queue::{LogIngester, ResultProcessor};
use crate::store::LogStore;

/// gRPC service for workflow workers: log streaming and result reporting.
pub struct WorkflowQueueService {
    logs: LogIngester<proto::WorkflowLogLine, WorkflowLogLine>,
    results: ResultProcessor,
    channel_capacity: usize,
}

impl WorkflowQueueService {
    pub fn new(
        store: Arc<dyn LogStore<WorkflowLogLine>>,
        results: ResultProcessor,
        channel_capacity: usize,
    ) -> Self {
        Self {
            logs: LogIngester::new("SendLog", store),
            results,
            channel_capacity,
        }
    }
}

#[tonic::async_trait]
impl WorkflowQueue for WorkflowQueueService {
    async fn send_log(
        &self,
        request: Request<Streaming<proto::WorkflowLogLine>>,
    ) -> Result<Response<()>, Status> {
        let caller = auth::caller(&request)?;
        caller.ensure_complete()?;

        let appended = ingest(request.into_inner(), self.logs.clone(), self.channel_capacity)
            .await
            .map_err(|e| {
                tracing::warn!(worker = %caller.worker_name, error = %e, "SendLog stream failed");
                Status::from(e)
            })?;

        tracing::debug!(worker = %caller.worker_name, appended, "SendLog stream closed");
        Ok(Response::new(()))
    }

    async fn send_result(
        &self,
        request: Request<proto::JobResult>,
    ) -> Result<Response<()>, Status> {
        let caller = auth::caller(&request)?;
        let result = request.into_inner();
        let job_id = result.build_id;

        match self.results.process(&caller, result).await {
            Ok(_) => Ok(Response::new(())),
            Err(e) => {
                if e.is_retryable() {
                    tracing::debug!(job_id, worker = %caller.worker_name, error = %e, "SendResult contended");
                } else {
                    tracing::warn!(job_id, worker = %caller.worker_name, error = %e, "SendResult failed");
                }
                Err(e.into())
            }
        }
    }
}
