//! Persistent entities touched by the worker-facing pipeline.

pub mod job;
pub mod log;
pub mod project;
pub mod spawn;
pub mod worker;

pub use job::{Job, JobId, JobStatus};
pub use log::{BuildLogLine, LogRecord, WorkflowLogLine};
pub use project::{Group, GroupPermission, NodeRun, PermissionLevel, Project, ProjectContext};
pub use spawn::{SpawnInfo, SpawnMessage, SpawnMessageId};
pub use worker::{Worker, WorkerStatus};
