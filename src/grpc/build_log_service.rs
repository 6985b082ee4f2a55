use std::sync::Arc;

use tonic::{Request, Response, Status, Streaming};

use crate::auth;
use crate::grpc::stream::ingest;
use crate::model::BuildLogLine;
use crate::proto;
use crate::proto::build_log_server::BuildLog;
use crate::queue::LogIngester;
use crate::store::LogStore;

/// gRPC service for the legacy per-build log stream.
pub struct BuildLogService {
    ingester: LogIngester<proto::BuildLogLine, BuildLogLine>,
    channel_capacity: usize,
}

impl BuildLogService {
    pub fn new(store: Arc<dyn LogStore<BuildLogLine>>, channel_capacity: usize) -> Self {
        Self {
            ingester: LogIngester::new("AddBuildLog", store),
            channel_capacity,
        }
    }
}

#[tonic::async_trait]
impl BuildLog for BuildLogService {
    async fn add_build_log(
        &self,
        request: Request<Streaming<proto::BuildLogLine>>,
    ) -> Result<Response<()>, Status> {
        let caller = auth::caller(&request)?;
        caller.ensure_complete()?;

        let appended = ingest(
            request.into_inner(),
            self.ingester.clone(),
            self.channel_capacity,
        )
        .await
        .map_err(|e| {
            tracing::warn!(worker = %caller.worker_name, error = %e, "AddBuildLog stream failed");
            Status::from(e)
        })?;

        tracing::debug!(worker = %caller.worker_name, appended, "AddBuildLog stream closed");
        Ok(Response::new(()))
    }
}
