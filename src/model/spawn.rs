use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::JobId;

/// Identifiers of the lifecycle messages recorded on a job's audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnMessageId {
    /// The worker finished the job. Args: worker name, duration.
    WorkerEnd,
}

impl SpawnMessageId {
    pub fn code(&self) -> u32 {
        match self {
            SpawnMessageId::WorkerEnd => 8,
        }
    }

    fn template(&self) -> &'static str {
        match self {
            SpawnMessageId::WorkerEnd => "{} finished working after {}",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnMessage {
    pub id: SpawnMessageId,
    pub args: Vec<String>,
}

impl SpawnMessage {
    pub fn worker_end(worker_name: &str, duration: &str) -> Self {
        Self {
            id: SpawnMessageId::WorkerEnd,
            args: vec![worker_name.to_string(), duration.to_string()],
        }
    }
}

impl fmt::Display for SpawnMessage {
    /// Fills the template placeholders in order; missing args render empty.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut args = self.args.iter();
        let mut pieces = self.id.template().split("{}");
        if let Some(first) = pieces.next() {
            f.write_str(first)?;
        }
        for piece in pieces {
            f.write_str(args.next().map(String::as_str).unwrap_or_default())?;
            f.write_str(piece)?;
        }
        Ok(())
    }
}

/// Immutable audit record of a job lifecycle step, timed by the worker clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnInfo {
    pub job_id: JobId,
    pub project_key: String,
    pub message: SpawnMessage,
    pub remote_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_end_renders_args() {
        let msg = SpawnMessage::worker_end("W", "12.3s");
        assert_eq!(msg.id.code(), 8);
        assert_eq!(msg.to_string(), "W finished working after 12.3s");
    }

    #[test]
    fn missing_args_render_empty() {
        let msg = SpawnMessage {
            id: SpawnMessageId::WorkerEnd,
            args: vec!["W".to_string()],
        };
        assert_eq!(msg.to_string(), "W finished working after ");
    }
}
