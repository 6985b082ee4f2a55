use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::DEFAULT_MAX_LOG_ENTRIES_PER_JOB;
use crate::model::{JobId, LogRecord};
use crate::store::{LogStore, StoreError};

/// In-memory append-only log store, one ordered vector per job.
#[derive(Debug)]
pub struct MemoryLogStore<E> {
    logs: RwLock<HashMap<JobId, Vec<E>>>,
    max_entries_per_job: usize,
}

impl<E> Default for MemoryLogStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> MemoryLogStore<E> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_LOG_ENTRIES_PER_JOB)
    }

    pub fn with_capacity(max_entries_per_job: usize) -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
            max_entries_per_job,
        }
    }

    pub async fn len(&self, job_id: JobId) -> usize {
        self.logs.read().await.get(&job_id).map_or(0, Vec::len)
    }

    pub async fn total_len(&self) -> usize {
        self.logs.read().await.values().map(Vec::len).sum()
    }
}

impl<E: LogRecord + Clone> MemoryLogStore<E> {
    /// All entries of a job in append order.
    pub async fn entries(&self, job_id: JobId) -> Vec<E> {
        self.logs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Full text of one step: its values concatenated in append order.
    pub async fn step_log(&self, job_id: JobId, step_order: u32) -> String {
        let logs = self.logs.read().await;
        logs.get(&job_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.step_order() == step_order)
                    .map(|e| e.value())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl<E: LogRecord> LogStore<E> for MemoryLogStore<E> {
    async fn append(&self, job_id: JobId, entry: E) -> Result<(), StoreError> {
        let mut logs = self.logs.write().await;
        let entries = logs.entry(job_id).or_default();
        if entries.len() >= self.max_entries_per_job {
            return Err(StoreError::CapacityExceeded {
                job_id,
                limit: self.max_entries_per_job,
            });
        }
        entries.push(entry);
        Ok(())
    }
}
