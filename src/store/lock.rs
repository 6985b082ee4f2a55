//! Non-blocking exclusive locks on job records.
//!
//! A lock is an entry in a shared `DashMap` keyed by job id. Acquisition
//! inserts into a vacant entry and fails immediately on an occupied one; there
//! is no wait queue and no expiry. The returned [`JobLockGuard`] releases the
//! entry on drop, so moving it into a [`Transaction`](super::Transaction)
//! scopes the lock to that transaction.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::model::JobId;
use crate::store::StoreError;

#[derive(Debug, Clone, Default)]
pub struct JobLockManager {
    held: Arc<DashMap<JobId, Uuid>>,
}

impl JobLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_lock(&self, job_id: JobId) -> Result<JobLockGuard, StoreError> {
        match self.held.entry(job_id) {
            Entry::Occupied(_) => Err(StoreError::Locked(job_id)),
            Entry::Vacant(slot) => {
                let holder = Uuid::new_v4();
                slot.insert(holder);
                tracing::trace!(job_id, holder = %holder, "Job locked");
                Ok(JobLockGuard {
                    job_id,
                    holder,
                    held: self.held.clone(),
                })
            }
        }
    }

    pub fn is_locked(&self, job_id: JobId) -> bool {
        self.held.contains_key(&job_id)
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}

/// Exclusive hold on one job; released when dropped.
#[derive(Debug)]
pub struct JobLockGuard {
    job_id: JobId,
    holder: Uuid,
    held: Arc<DashMap<JobId, Uuid>>,
}

impl JobLockGuard {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn holder(&self) -> Uuid {
        self.holder
    }
}

impl Drop for JobLockGuard {
    fn drop(&mut self) {
        let holder = self.holder;
        self.held.remove_if(&self.job_id, |_, h| *h == holder);
        tracing::trace!(job_id = self.job_id, holder = %holder, "Job unlocked");
    }
}
