use tokio::sync::mpsc;
use tonic::Streaming;

use crate::codec::DecodeError;
use crate::error::{CoordinatorError, Result};
use crate::model::LogRecord;
use crate::queue::LogIngester;

/// Pump an inbound gRPC stream into a bounded channel drained by a spawned
/// ingestion task, and wait for that task to finish.
///
/// The pump stops at the first transport error or as soon as the ingester
/// hangs up after a failure of its own.
pub(crate) async fn ingest<P, E>(
    mut inbound: Streaming<P>,
    ingester: LogIngester<P, E>,
    capacity: usize,
) -> Result<u64>
where
    P: Send + 'static,
    E: LogRecord + TryFrom<P, Error = DecodeError>,
{
    let stream = ingester.stream_name();
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let consumer = tokio::spawn(async move { ingester.run(rx).await });

    loop {
        let received = tokio::select! {
            received = inbound.message() => received,
            _ = tx.closed() => break,
        };
        let item = match received {
            Ok(Some(message)) => Ok(message),
            Ok(None) => break,
            Err(status) => {
                tracing::debug!(stream, error = %status, "Log stream receive failed");
                Err(CoordinatorError::GrpcError(status))
            }
        };
        let failed = item.is_err();
        if tx.send(item).await.is_err() || failed {
            break;
        }
    }
    drop(tx);

    consumer
        .await
        .map_err(|e| CoordinatorError::Internal(format!("{} ingestion task failed: {}", stream, e)))?
}
