use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerStatus {
    /// Idle and available for a new job
    Waiting,
    Building,
    Disabled,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Waiting => write!(f, "Waiting"),
            WorkerStatus::Building => write!(f, "Building"),
            WorkerStatus::Disabled => write!(f, "Disabled"),
        }
    }
}

/// A registered worker agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub name: String,
    /// Group owning the worker; `None` for shared infrastructure workers.
    #[serde(default)]
    pub group_id: Option<i64>,
    pub status: WorkerStatus,
}

impl Worker {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            group_id: None,
            status: WorkerStatus::Waiting,
        }
    }

    pub fn with_group(mut self, group_id: i64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_status(mut self, status: WorkerStatus) -> Self {
        self.status = status;
        self
    }
}
