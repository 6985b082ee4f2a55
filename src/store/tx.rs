use uuid::Uuid;

use crate::model::{Job, JobId, JobStatus, SpawnInfo, WorkerStatus};
use crate::store::JobLockGuard;

/// A staged mutation, applied only when its transaction commits.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    WorkerStatus {
        worker_id: String,
        status: WorkerStatus,
    },
    SpawnInfos {
        job_id: JobId,
        infos: Vec<SpawnInfo>,
    },
    /// Replace the job row, provided it still has status `expected`.
    JobStatus { expected: JobStatus, job: Job },
}

/// Unit of work: staged writes plus the job locks scoped to it.
///
/// Dropping an uncommitted transaction discards its writes and releases its
/// locks.
#[derive(Debug)]
pub struct Transaction {
    id: Uuid,
    writes: Vec<Write>,
    locks: Vec<JobLockGuard>,
    finished: bool,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            writes: Vec::new(),
            locks: Vec::new(),
            finished: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&mut self, write: Write) {
        self.writes.push(write);
    }

    /// Keep `guard` until the transaction ends.
    pub fn hold(&mut self, guard: JobLockGuard) {
        self.locks.push(guard);
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn holds_lock(&self, job_id: JobId) -> bool {
        self.locks.iter().any(|g| g.job_id() == job_id)
    }

    /// Hand the staged writes and held locks to the committer.
    pub(crate) fn finish(mut self) -> (Vec<Write>, Vec<JobLockGuard>) {
        self.finished = true;
        (
            std::mem::take(&mut self.writes),
            std::mem::take(&mut self.locks),
        )
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                tx = %self.id,
                discarded = self.writes.len(),
                locks = self.locks.len(),
                "Transaction rolled back"
            );
        }
    }
}
