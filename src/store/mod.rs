//! Storage contracts used by the log and result pipelines.
//!
//! Writes that belong to a result report are staged on a [`Transaction`]
//! and become visible only when [`UnitOfWork::commit`] applies them all.
//! Log appends are independent and durable on return.
//!
//! [`memory`] provides the in-process implementation of every contract.

pub mod lock;
pub mod logs;
pub mod memory;
pub mod seed;
pub mod tx;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::WorkerIdentity;
use crate::model::{Job, JobId, JobStatus, ProjectContext, SpawnInfo, WorkerStatus};

pub use lock::{JobLockGuard, JobLockManager};
pub use logs::MemoryLogStore;
pub use memory::MemoryDatabase;
pub use tx::{Transaction, Write};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("job {0} is locked")]
    Locked(JobId),

    #[error("group {group} has no execute permission on project {project_key}")]
    PermissionDenied { project_key: String, group: String },

    #[error("job {job_id} changed concurrently: expected {expected}, found {actual}")]
    Conflict {
        job_id: JobId,
        expected: JobStatus,
        actual: JobStatus,
    },

    #[error("log of job {job_id} exceeds {limit} entries")]
    CapacityExceeded { job_id: JobId, limit: usize },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// A job loaded together with the exclusive lock taken on it.
#[derive(Debug)]
pub struct LockedJob {
    pub job: Job,
    pub guard: JobLockGuard,
}

/// Durable, append-only log storage for one log shape.
#[async_trait]
pub trait LogStore<E>: Send + Sync {
    async fn append(&self, job_id: JobId, entry: E) -> Result<(), StoreError>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Lock and load a queued job without waiting.
    ///
    /// Fails with [`StoreError::Locked`] when another holder has the job and
    /// with [`StoreError::NotFound`] when the job is unknown or already done.
    async fn load_and_lock_no_wait(&self, job_id: JobId) -> Result<LockedJob, StoreError>;

    /// Stage a status transition of `job`; returns the job as it will be
    /// after commit.
    async fn update_status(
        &self,
        tx: &mut Transaction,
        job: &Job,
        status: JobStatus,
    ) -> Result<Job, StoreError>;
}

#[async_trait]
pub trait WorkerStore: Send + Sync {
    async fn update_status(
        &self,
        tx: &mut Transaction,
        worker_id: &str,
        status: WorkerStatus,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ProjectResolver: Send + Sync {
    /// Resolve the project owning `job`, checking that `caller` may act on it.
    async fn load_owning_context(
        &self,
        job: &Job,
        caller: &WorkerIdentity,
    ) -> Result<ProjectContext, StoreError>;
}

#[async_trait]
pub trait SpawnInfoStore: Send + Sync {
    async fn append(
        &self,
        tx: &mut Transaction,
        context: &ProjectContext,
        job_id: JobId,
        infos: Vec<SpawnInfo>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn begin(&self) -> Transaction;

    /// Apply every staged write or none of them, then release held locks.
    async fn commit(&self, tx: Transaction) -> Result<(), StoreError>;
}

/// The collaborators driven by the result processor.
#[derive(Clone)]
pub struct Stores {
    pub jobs: Arc<dyn JobStore>,
    pub workers: Arc<dyn WorkerStore>,
    pub projects: Arc<dyn ProjectResolver>,
    pub spawn_infos: Arc<dyn SpawnInfoStore>,
    pub unit_of_work: Arc<dyn UnitOfWork>,
}

impl Stores {
    /// Back every collaborator with the same in-memory database.
    pub fn memory(db: Arc<MemoryDatabase>) -> Self {
        Self {
            jobs: db.clone(),
            workers: db.clone(),
            projects: db.clone(),
            spawn_infos: db.clone(),
            unit_of_work: db,
        }
    }
}
