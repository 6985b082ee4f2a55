use chrono::{DateTime, Utc};

use crate::auth::WorkerIdentity;
use crate::codec::{decode_remote_time, ResultReport};
use crate::error::{CoordinatorError, Result};
use crate::model::{Job, SpawnInfo, SpawnMessage, WorkerStatus};
use crate::proto;
use crate::store::{LockedJob, StoreError, Stores};

/// Commits the terminal result of a job reported by a worker.
///
/// One call locks the job without waiting, then stages the worker status,
/// the "worker finished" spawn event and the job status transition on a
/// single transaction and commits it. Any failure before the commit drops
/// the transaction: staged writes are discarded and the job lock released.
///
/// Nothing is retried here. Contention surfaces as
/// [`CoordinatorError::JobLocked`] and the worker retries.
#[derive(Clone)]
pub struct ResultProcessor {
    stores: Stores,
}

impl ResultProcessor {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Process a wire result from an authenticated worker.
    pub async fn process(&self, caller: &WorkerIdentity, result: proto::JobResult) -> Result<Job> {
        let caller = caller.ensure_complete()?;
        let report = ResultReport::try_from(result)?;
        self.commit_report(caller, report).await
    }

    async fn commit_report(&self, caller: &WorkerIdentity, report: ResultReport) -> Result<Job> {
        let job_id = report.job_id;
        tracing::debug!(job_id, worker = %caller.worker_name, status = %report.status, "Processing job result");

        let LockedJob { job, guard } = self
            .stores
            .jobs
            .load_and_lock_no_wait(job_id)
            .await
            .map_err(|e| match e {
                StoreError::Locked(id) => CoordinatorError::JobLocked(id),
                StoreError::NotFound { .. } => CoordinatorError::JobNotFound(job_id),
                source => CoordinatorError::Store {
                    operation: "load and lock job",
                    job_id,
                    source,
                },
            })?;

        let mut tx = self.stores.unit_of_work.begin();
        tx.hold(guard);

        // Best effort: a stale worker status does not threaten job state.
        if let Err(e) = self
            .stores
            .workers
            .update_status(&mut tx, &caller.worker_id, WorkerStatus::Waiting)
            .await
        {
            tracing::warn!(
                job_id,
                worker_id = %caller.worker_id,
                error = %e,
                "Cannot update worker status"
            );
        }

        let remote_time: DateTime<Utc> = decode_remote_time(report.remote_time.as_ref())?;

        let context = self
            .stores
            .projects
            .load_owning_context(&job, caller)
            .await
            .map_err(|source| CoordinatorError::Store {
                operation: "load owning project",
                job_id,
                source,
            })?;

        let infos = vec![SpawnInfo {
            job_id,
            project_key: context.project_key.clone(),
            message: SpawnMessage::worker_end(&caller.worker_name, &report.duration),
            remote_time,
        }];
        self.stores
            .spawn_infos
            .append(&mut tx, &context, job_id, infos)
            .await
            .map_err(|source| {
                tracing::error!(job_id, error = %source, "Cannot save spawn info");
                CoordinatorError::Store {
                    operation: "save spawn info",
                    job_id,
                    source,
                }
            })?;

        let updated = self
            .stores
            .jobs
            .update_status(&mut tx, &job, report.status)
            .await
            .map_err(|source| CoordinatorError::Store {
                operation: "update job status",
                job_id,
                source,
            })?;

        self.stores
            .unit_of_work
            .commit(tx)
            .await
            .map_err(|source| CoordinatorError::Commit { job_id, source })?;

        tracing::info!(
            job_id,
            worker = %caller.worker_name,
            project = %context.project_key,
            status = %updated.status,
            duration = %report.duration,
            "Job result committed"
        );
        Ok(updated)
    }
}
