use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::codec::DecodeError;
use crate::error::{CoordinatorError, Result};
use crate::model::LogRecord;
use crate::store::LogStore;

/// Item delivered by the transport: a raw wire message or a receive error.
pub type Inbound<P> = Result<P>;

/// Appends the messages of one log stream, in receipt order.
///
/// `P` is the wire message, `E` the decoded log line. The stream is fed
/// through a bounded channel; the channel closing is the clean end of the
/// stream.
pub struct LogIngester<P, E> {
    stream: &'static str,
    store: Arc<dyn LogStore<E>>,
    _wire: PhantomData<fn(P)>,
}

impl<P, E> Clone for LogIngester<P, E> {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream,
            store: self.store.clone(),
            _wire: PhantomData,
        }
    }
}

impl<P, E> LogIngester<P, E>
where
    P: Send + 'static,
    E: LogRecord + TryFrom<P, Error = DecodeError>,
{
    pub fn new(stream: &'static str, store: Arc<dyn LogStore<E>>) -> Self {
        Self {
            stream,
            store,
            _wire: PhantomData,
        }
    }

    pub fn stream_name(&self) -> &'static str {
        self.stream
    }

    /// Consume `inbound` until it closes; returns the number of appended
    /// lines. The first receive, decode or append error stops the stream.
    pub async fn run(&self, mut inbound: mpsc::Receiver<Inbound<P>>) -> Result<u64> {
        tracing::debug!(stream = self.stream, "Log stream started");
        let mut appended = 0u64;

        while let Some(item) = inbound.recv().await {
            let message = item?;
            let line = E::try_from(message).map_err(|e| {
                tracing::warn!(stream = self.stream, error = %e, "Malformed log line");
                CoordinatorError::Decode(e)
            })?;
            let job_id = line.job_id();
            self.store
                .append(job_id, line)
                .await
                .map_err(|source| CoordinatorError::LogAppend {
                    stream: self.stream,
                    job_id,
                    source,
                })?;
            appended += 1;
        }

        tracing::debug!(stream = self.stream, appended, "Log stream ended");
        Ok(appended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkflowLogLine;
    use crate::proto;
    use crate::store::MemoryLogStore;

    fn wire(job_id: i64, val: &str) -> proto::WorkflowLogLine {
        proto::WorkflowLogLine {
            workflow_node_run_id: 1,
            workflow_node_job_run_id: job_id,
            step_order: 0,
            val: val.to_string(),
            ..Default::default()
        }
    }

    fn ingester(
        store: Arc<MemoryLogStore<WorkflowLogLine>>,
    ) -> LogIngester<proto::WorkflowLogLine, WorkflowLogLine> {
        LogIngester::new("SendLog", store)
    }

    #[tokio::test]
    async fn closed_channel_ends_cleanly() {
        let store = Arc::new(MemoryLogStore::new());
        let (tx, rx) = mpsc::channel(4);
        drop(tx);

        let appended = ingester(store.clone()).run(rx).await.unwrap();
        assert_eq!(appended, 0);
        assert_eq!(store.total_len().await, 0);
    }

    #[tokio::test]
    async fn lines_keep_receipt_order() {
        let store = Arc::new(MemoryLogStore::new());
        let (tx, rx) = mpsc::channel(2);
        let task = tokio::spawn({
            let ingester = ingester(store.clone());
            async move { ingester.run(rx).await }
        });

        for i in 0..50 {
            tx.send(Ok(wire(1, &format!("line {i}\n")))).await.unwrap();
        }
        drop(tx);

        assert_eq!(task.await.unwrap().unwrap(), 50);
        let values: Vec<String> = store.entries(1).await.into_iter().map(|l| l.value).collect();
        let expected: Vec<String> = (0..50).map(|i| format!("line {i}\n")).collect();
        assert_eq!(values, expected);
    }

    #[tokio::test]
    async fn malformed_line_aborts_stream() {
        let store = Arc::new(MemoryLogStore::new());
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok(wire(1, "first"))).await.unwrap();
        tx.send(Ok(wire(0, "no job"))).await.unwrap();
        tx.send(Ok(wire(1, "never stored"))).await.unwrap();
        drop(tx);

        let err = ingester(store.clone()).run(rx).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Decode(DecodeError::MissingId(_))));
        assert_eq!(store.step_log(1, 0).await, "first");
    }

    #[tokio::test]
    async fn receive_error_aborts_stream() {
        let store = Arc::new(MemoryLogStore::new());
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok(wire(1, "a"))).await.unwrap();
        tx.send(Err(CoordinatorError::GrpcError(tonic::Status::cancelled(
            "client went away",
        ))))
        .await
        .unwrap();
        drop(tx);

        let err = ingester(store.clone()).run(rx).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::GrpcError(_)));
        assert_eq!(store.len(1).await, 1);
    }

    #[tokio::test]
    async fn append_failure_aborts_stream() {
        let store = Arc::new(MemoryLogStore::with_capacity(1));
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok(wire(3, "a"))).await.unwrap();
        tx.send(Ok(wire(3, "b"))).await.unwrap();
        drop(tx);

        let err = ingester(store).run(rx).await.unwrap_err();
        match err {
            CoordinatorError::LogAppend { stream, job_id, .. } => {
                assert_eq!(stream, "SendLog");
                assert_eq!(job_id, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
