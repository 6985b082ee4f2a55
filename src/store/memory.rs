//! In-memory database backing jobs, workers, projects and spawn events.
//!
//! All tables sit behind one `RwLock` so that a commit applies its whole
//! write set under a single exclusive guard. Job locks live beside the
//! tables in a [`JobLockManager`] and are never taken while waiting.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::auth::WorkerIdentity;
use crate::model::{
    Job, JobId, JobStatus, NodeRun, PermissionLevel, Project, ProjectContext, SpawnInfo, Worker,
    WorkerStatus,
};
use crate::store::{
    JobLockManager, JobStore, LockedJob, ProjectResolver, SpawnInfoStore, StoreError, Transaction,
    UnitOfWork, WorkerStore, Write,
};

#[derive(Debug, Default)]
struct Tables {
    jobs: HashMap<JobId, Job>,
    workers: HashMap<String, Worker>,
    projects: HashMap<String, Project>,
    node_runs: HashMap<i64, NodeRun>,
    spawn_infos: HashMap<JobId, Vec<SpawnInfo>>,
}

#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: RwLock<Tables>,
    locks: JobLockManager,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locks(&self) -> &JobLockManager {
        &self.locks
    }

    pub async fn insert_job(&self, job: Job) {
        self.tables.write().await.jobs.insert(job.id, job);
    }

    pub async fn insert_worker(&self, worker: Worker) {
        self.tables
            .write()
            .await
            .workers
            .insert(worker.id.clone(), worker);
    }

    pub async fn insert_project(&self, project: Project) {
        self.tables
            .write()
            .await
            .projects
            .insert(project.key.clone(), project);
    }

    pub async fn insert_node_run(&self, node_run: NodeRun) {
        self.tables
            .write()
            .await
            .node_runs
            .insert(node_run.id, node_run);
    }

    pub async fn job(&self, job_id: JobId) -> Option<Job> {
        self.tables.read().await.jobs.get(&job_id).cloned()
    }

    pub async fn worker(&self, worker_id: &str) -> Option<Worker> {
        self.tables.read().await.workers.get(worker_id).cloned()
    }

    pub async fn spawn_infos(&self, job_id: JobId) -> Vec<SpawnInfo> {
        self.tables
            .read()
            .await
            .spawn_infos
            .get(&job_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Overwrite a job status outside any transaction. Scheduling is not
    /// handled here; this is the hook an external scheduler uses.
    pub async fn set_job_status(&self, job_id: JobId, status: JobStatus) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let job = tables
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| StoreError::not_found("job", job_id))?;
        job.status = status;
        Ok(())
    }

    pub async fn set_worker_status(
        &self,
        worker_id: &str,
        status: WorkerStatus,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let worker = tables
            .workers
            .get_mut(worker_id)
            .ok_or_else(|| StoreError::not_found("worker", worker_id))?;
        worker.status = status;
        Ok(())
    }
}

fn check_write(tables: &Tables, write: &Write) -> Result<(), StoreError> {
    if let Write::JobStatus { expected, job } = write {
        let current = tables
            .jobs
            .get(&job.id)
            .ok_or_else(|| StoreError::not_found("job", job.id))?;
        if current.status != *expected {
            return Err(StoreError::Conflict {
                job_id: job.id,
                expected: *expected,
                actual: current.status,
            });
        }
    }
    Ok(())
}

fn apply_write(tables: &mut Tables, write: Write) {
    match write {
        Write::WorkerStatus { worker_id, status } => match tables.workers.get_mut(&worker_id) {
            Some(worker) => worker.status = status,
            None => {
                tracing::warn!(worker_id = %worker_id, "Worker vanished before commit, status update skipped")
            }
        },
        Write::SpawnInfos { job_id, infos } => {
            tables.spawn_infos.entry(job_id).or_default().extend(infos);
        }
        Write::JobStatus { job, .. } => {
            tables.jobs.insert(job.id, job);
        }
    }
}

#[async_trait]
impl JobStore for MemoryDatabase {
    async fn load_and_lock_no_wait(&self, job_id: JobId) -> Result<LockedJob, StoreError> {
        let guard = self.locks.try_lock(job_id)?;
        let tables = self.tables.read().await;
        match tables.jobs.get(&job_id) {
            Some(job) if !job.status.is_terminal() => Ok(LockedJob {
                job: job.clone(),
                guard,
            }),
            // finished jobs have left the queue
            _ => Err(StoreError::not_found("job", job_id)),
        }
    }

    async fn update_status(
        &self,
        tx: &mut Transaction,
        job: &Job,
        status: JobStatus,
    ) -> Result<Job, StoreError> {
        if !tx.holds_lock(job.id) {
            return Err(StoreError::Backend(format!(
                "job {} is not locked by transaction {}",
                job.id,
                tx.id()
            )));
        }
        let mut updated = job.clone();
        updated
            .transition(status, Utc::now())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        tx.stage(Write::JobStatus {
            expected: job.status,
            job: updated.clone(),
        });
        Ok(updated)
    }
}

#[async_trait]
impl WorkerStore for MemoryDatabase {
    async fn update_status(
        &self,
        tx: &mut Transaction,
        worker_id: &str,
        status: WorkerStatus,
    ) -> Result<(), StoreError> {
        if !self.tables.read().await.workers.contains_key(worker_id) {
            return Err(StoreError::not_found("worker", worker_id));
        }
        tx.stage(Write::WorkerStatus {
            worker_id: worker_id.to_string(),
            status,
        });
        Ok(())
    }
}

#[async_trait]
impl ProjectResolver for MemoryDatabase {
    async fn load_owning_context(
        &self,
        job: &Job,
        caller: &WorkerIdentity,
    ) -> Result<ProjectContext, StoreError> {
        let tables = self.tables.read().await;
        let node_run = tables
            .node_runs
            .get(&job.node_run_id)
            .ok_or_else(|| StoreError::not_found("workflow node run", job.node_run_id))?;
        let project = tables
            .projects
            .get(&node_run.project_key)
            .ok_or_else(|| StoreError::not_found("project", &node_run.project_key))?;

        // group-less workers belong to the shared infrastructure
        if let Some(group) = &caller.group {
            let allowed = project
                .level_for(group.id)
                .is_some_and(|level| level >= PermissionLevel::ReadExecute);
            if !allowed {
                return Err(StoreError::PermissionDenied {
                    project_key: project.key.clone(),
                    group: group.name.clone(),
                });
            }
        }

        Ok(ProjectContext {
            project_key: project.key.clone(),
            node_run_id: node_run.id,
        })
    }
}

#[async_trait]
impl SpawnInfoStore for MemoryDatabase {
    async fn append(
        &self,
        tx: &mut Transaction,
        context: &ProjectContext,
        job_id: JobId,
        infos: Vec<SpawnInfo>,
    ) -> Result<(), StoreError> {
        if let Some(info) = infos
            .iter()
            .find(|i| i.job_id != job_id || i.project_key != context.project_key)
        {
            return Err(StoreError::Backend(format!(
                "spawn info for job {} in project {} does not belong to job {} in project {}",
                info.job_id, info.project_key, job_id, context.project_key
            )));
        }
        tx.stage(Write::SpawnInfos { job_id, infos });
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for MemoryDatabase {
    fn begin(&self) -> Transaction {
        Transaction::new()
    }

    async fn commit(&self, tx: Transaction) -> Result<(), StoreError> {
        let tx_id = tx.id();
        let (writes, locks) = tx.finish();

        let mut tables = self.tables.write().await;
        for write in &writes {
            check_write(&tables, write)?;
        }
        let count = writes.len();
        for write in writes {
            apply_write(&mut tables, write);
        }
        drop(tables);
        drop(locks);

        tracing::debug!(tx = %tx_id, writes = count, "Transaction committed");
        Ok(())
    }
}
