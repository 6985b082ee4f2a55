use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::DecodeError;
use crate::error::CoordinatorError;

pub type JobId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Waiting,
    Building,
    Success,
    Fail,
    Stopped,
}

impl JobStatus {
    /// Terminal statuses end the job; a worker reports exactly one of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Fail | JobStatus::Stopped)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Waiting => write!(f, "Waiting"),
            JobStatus::Building => write!(f, "Building"),
            JobStatus::Success => write!(f, "Success"),
            JobStatus::Fail => write!(f, "Fail"),
            JobStatus::Stopped => write!(f, "Stopped"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Waiting" => Ok(JobStatus::Waiting),
            "Building" => Ok(JobStatus::Building),
            "Success" => Ok(JobStatus::Success),
            "Fail" => Ok(JobStatus::Fail),
            "Stopped" => Ok(JobStatus::Stopped),
            other => Err(DecodeError::UnknownStatus(other.to_string())),
        }
    }
}

/// A workflow node job run waiting for, or executed by, a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Workflow node run owning this job; resolves to the owning project.
    pub node_run_id: i64,
    pub status: JobStatus,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub done_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: JobId, node_run_id: i64) -> Self {
        Self {
            id,
            node_run_id,
            status: JobStatus::Waiting,
            queued_at: Utc::now(),
            started_at: None,
            done_at: None,
        }
    }

    /// Convenience for jobs already picked up by a worker.
    pub fn building(id: JobId, node_run_id: i64) -> Self {
        let mut job = Self::new(id, node_run_id);
        job.status = JobStatus::Building;
        job.started_at = Some(job.queued_at);
        job
    }

    /// Apply a status transition in place.
    ///
    /// Terminal jobs never move again, and a building job cannot go back to
    /// waiting. Re-applying the current non-terminal status is a no-op.
    pub fn transition(&mut self, to: JobStatus, at: DateTime<Utc>) -> Result<(), CoordinatorError> {
        let from = self.status;
        let allowed = match (from, to) {
            (f, _) if f.is_terminal() => false,
            (JobStatus::Building, JobStatus::Waiting) => false,
            _ => true,
        };
        if !allowed {
            return Err(CoordinatorError::InvalidTransition {
                job_id: self.id,
                from,
                to,
            });
        }
        if from == to {
            return Ok(());
        }

        if to == JobStatus::Building {
            self.started_at = Some(at);
        }
        if to.is_terminal() {
            self.started_at.get_or_insert(at);
            self.done_at = Some(at);
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_round_trip() {
        for status in [
            JobStatus::Waiting,
            JobStatus::Building,
            JobStatus::Success,
            JobStatus::Fail,
            JobStatus::Stopped,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = "Done".parse::<JobStatus>().unwrap_err();
        assert_eq!(err, DecodeError::UnknownStatus("Done".to_string()));
        // names are case sensitive on the wire
        assert!("success".parse::<JobStatus>().is_err());
    }

    #[test]
    fn building_to_success_sets_done() {
        let mut job = Job::building(42, 7);
        let now = Utc::now();
        job.transition(JobStatus::Success, now).unwrap();
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(job.done_at, Some(now));
        assert!(job.started_at.is_some());
    }

    #[test]
    fn waiting_to_fail_backfills_start() {
        let mut job = Job::new(1, 1);
        let now = Utc::now();
        job.transition(JobStatus::Fail, now).unwrap();
        assert_eq!(job.started_at, Some(now));
        assert_eq!(job.done_at, Some(now));
    }

    #[test]
    fn terminal_job_never_moves() {
        let mut job = Job::building(42, 7);
        job.transition(JobStatus::Fail, Utc::now()).unwrap();

        let err = job.transition(JobStatus::Success, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::InvalidTransition {
                job_id: 42,
                from: JobStatus::Fail,
                to: JobStatus::Success,
            }
        ));
        assert_eq!(job.status, JobStatus::Fail);
    }

    #[test]
    fn building_cannot_requeue() {
        let mut job = Job::building(3, 1);
        assert!(job.transition(JobStatus::Waiting, Utc::now()).is_err());
    }
}
