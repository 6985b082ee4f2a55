//! Conversion between the `queue` wire messages and internal types.
//!
//! All timestamps cross the wire as `google.protobuf.Timestamp` and are
//! decoded into `DateTime<Utc>` through [`decode_timestamp`], which rejects
//! values outside the representable range instead of clamping them.

use chrono::{DateTime, Utc};
use prost_types::Timestamp;
use thiserror::Error;

use crate::model::{BuildLogLine, JobId, JobStatus, WorkflowLogLine};
use crate::proto;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing {0} identifier")]
    MissingId(&'static str),

    #[error("invalid step order {0}")]
    InvalidStepOrder(i32),

    #[error("unknown job status {0:?}")]
    UnknownStatus(String),

    #[error("status {0} is not a terminal status")]
    NonTerminalStatus(JobStatus),

    #[error("missing remote time")]
    MissingRemoteTime,

    #[error("invalid timestamp {seconds}s {nanos}ns")]
    InvalidTimestamp { seconds: i64, nanos: i32 },
}

/// Decode a wire timestamp. Nanos must lie in `0..1_000_000_000`.
pub fn decode_timestamp(ts: &Timestamp) -> Result<DateTime<Utc>, DecodeError> {
    let invalid = || DecodeError::InvalidTimestamp {
        seconds: ts.seconds,
        nanos: ts.nanos,
    };
    let nanos = u32::try_from(ts.nanos).map_err(|_| invalid())?;
    if nanos >= 1_000_000_000 {
        return Err(invalid());
    }
    DateTime::from_timestamp(ts.seconds, nanos).ok_or_else(invalid)
}

pub fn encode_timestamp(dt: &DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: dt.timestamp(),
        // always below 2e9 for a valid DateTime
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}

/// Decode the worker-reported completion time of a result.
pub fn decode_remote_time(ts: Option<&Timestamp>) -> Result<DateTime<Utc>, DecodeError> {
    decode_timestamp(ts.ok_or(DecodeError::MissingRemoteTime)?)
}

fn decode_optional(ts: Option<&Timestamp>) -> Result<Option<DateTime<Utc>>, DecodeError> {
    ts.map(decode_timestamp).transpose()
}

fn positive_id(value: i64, what: &'static str) -> Result<i64, DecodeError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(DecodeError::MissingId(what))
    }
}

fn step_order(value: i32) -> Result<u32, DecodeError> {
    u32::try_from(value).map_err(|_| DecodeError::InvalidStepOrder(value))
}

impl TryFrom<proto::BuildLogLine> for BuildLogLine {
    type Error = DecodeError;

    fn try_from(msg: proto::BuildLogLine) -> Result<Self, Self::Error> {
        Ok(Self {
            build_id: positive_id(msg.pipeline_build_id, "pipeline build")?,
            job_id: positive_id(msg.pipeline_build_job_id, "pipeline build job")?,
            step_order: step_order(msg.step_order)?,
            start: decode_optional(msg.start.as_ref())?,
            last_modified: decode_optional(msg.last_modified.as_ref())?,
            done: decode_optional(msg.done.as_ref())?,
            value: msg.val,
        })
    }
}

impl TryFrom<proto::WorkflowLogLine> for WorkflowLogLine {
    type Error = DecodeError;

    fn try_from(msg: proto::WorkflowLogLine) -> Result<Self, Self::Error> {
        Ok(Self {
            node_run_id: positive_id(msg.workflow_node_run_id, "workflow node run")?,
            job_id: positive_id(msg.workflow_node_job_run_id, "workflow node job run")?,
            step_order: step_order(msg.step_order)?,
            start: decode_optional(msg.start.as_ref())?,
            last_modified: decode_optional(msg.last_modified.as_ref())?,
            done: decode_optional(msg.done.as_ref())?,
            value: msg.val,
        })
    }
}

/// Envelope of a result report.
///
/// The remote time stays in wire form: it is decoded inside the result
/// transaction, after the job has been locked.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultReport {
    pub job_id: JobId,
    pub status: JobStatus,
    pub duration: String,
    pub remote_time: Option<Timestamp>,
}

impl TryFrom<proto::JobResult> for ResultReport {
    type Error = DecodeError;

    fn try_from(msg: proto::JobResult) -> Result<Self, Self::Error> {
        let status: JobStatus = msg.status.parse()?;
        if !status.is_terminal() {
            return Err(DecodeError::NonTerminalStatus(status));
        }
        Ok(Self {
            job_id: positive_id(msg.build_id, "job")?,
            status,
            duration: msg.duration.trim().to_string(),
            remote_time: msg.remote_time,
        })
    }
}

impl From<&ResultReport> for proto::JobResult {
    fn from(report: &ResultReport) -> Self {
        Self {
            build_id: report.job_id,
            status: report.status.to_string(),
            duration: report.duration.clone(),
            remote_time: report.remote_time.clone(),
        }
    }
}
