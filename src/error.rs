use thiserror::Error;
use tonic::Status;

use crate::codec::DecodeError;
use crate::model::JobId;
use crate::model::JobStatus;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Caller is not an authenticated worker")]
    Forbidden,

    #[error("Job {0} is locked by another result report, retry later")]
    JobLocked(JobId),

    #[error("Job {0} not found in queue")]
    JobNotFound(JobId),

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("{operation} failed for job {job_id}: {source}")]
    Store {
        operation: &'static str,
        job_id: JobId,
        #[source]
        source: StoreError,
    },

    #[error("{stream}: unable to insert log of job {job_id}: {source}")]
    LogAppend {
        stream: &'static str,
        job_id: JobId,
        #[source]
        source: StoreError,
    },

    #[error("Cannot commit result of job {job_id}: {source}")]
    Commit {
        job_id: JobId,
        #[source]
        source: StoreError,
    },

    #[error("gRPC error: {0}")]
    GrpcError(#[from] tonic::Status),

    #[error("Transport error: {0}")]
    TransportError(#[from] tonic::transport::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;

impl CoordinatorError {
    /// Contention and transient storage errors are safe for the worker to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoordinatorError::JobLocked(_) | CoordinatorError::Commit { .. }
        )
    }
}

impl From<CoordinatorError> for Status {
    fn from(err: CoordinatorError) -> Self {
        let message = err.to_string();
        match err {
            CoordinatorError::Forbidden => Status::permission_denied(message),
            CoordinatorError::JobLocked(_) => Status::aborted(message),
            CoordinatorError::JobNotFound(_) => Status::not_found(message),
            CoordinatorError::InvalidTransition { .. } => Status::failed_precondition(message),
            CoordinatorError::Decode(_) => Status::invalid_argument(message),
            CoordinatorError::Store { source, .. } => match source {
                StoreError::PermissionDenied { .. } => Status::permission_denied(message),
                StoreError::NotFound { .. } => Status::not_found(message),
                _ => Status::internal(message),
            },
            CoordinatorError::LogAppend { .. } => Status::internal(message),
            CoordinatorError::Commit { .. } => Status::unavailable(message),
            CoordinatorError::GrpcError(status) => status,
            CoordinatorError::TransportError(_) | CoordinatorError::Internal(_) => {
                Status::internal(message)
            }
        }
    }
}
