use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::JobId;

/// Common view over the log line shapes accepted from workers.
pub trait LogRecord: Send + Sync + 'static {
    fn job_id(&self) -> JobId;
    fn step_order(&self) -> u32;
    fn value(&self) -> &str;
}

/// Line of the legacy per-job build log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLogLine {
    pub build_id: i64,
    pub job_id: JobId,
    pub step_order: u32,
    pub value: String,
    pub start: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub done: Option<DateTime<Utc>>,
}

/// Line of a workflow node job run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowLogLine {
    pub node_run_id: i64,
    pub job_id: JobId,
    pub step_order: u32,
    pub value: String,
    pub start: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub done: Option<DateTime<Utc>>,
}

impl LogRecord for BuildLogLine {
    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn step_order(&self) -> u32 {
        self.step_order
    }

    fn value(&self) -> &str {
        &self.value
    }
}

impl LogRecord for WorkflowLogLine {
    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn step_order(&self) -> u32 {
        self.step_order
    }

    fn value(&self) -> &str {
        &self.value
    }
}
