//! JSON fixtures preloaded at startup.
//!
//! Scheduling and worker provisioning happen elsewhere; a seed file stands in
//! for them so a coordinator can be run against known jobs and workers.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::auth::{SessionRegistry, WorkerIdentity};
use crate::error::{CoordinatorError, Result};
use crate::model::{Group, Job, NodeRun, Project, Worker};
use crate::store::MemoryDatabase;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedWorker {
    #[serde(flatten)]
    pub worker: Worker,
    /// Session token the worker presents in `x-worker-session`.
    pub session: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub node_runs: Vec<NodeRun>,
    #[serde(default)]
    pub workers: Vec<SeedWorker>,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl SeedData {
    pub async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            CoordinatorError::Internal(format!("cannot read seed file {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| CoordinatorError::Internal(format!("invalid seed data: {}", e)))
    }

    /// Load every entity into `db` and open a session per worker.
    pub async fn apply(self, db: &MemoryDatabase, sessions: &SessionRegistry) -> Result<()> {
        for project in self.projects {
            db.insert_project(project).await;
        }
        for node_run in self.node_runs {
            db.insert_node_run(node_run).await;
        }
        for job in self.jobs {
            db.insert_job(job).await;
        }
        for SeedWorker { worker, session } in self.workers {
            let group = match worker.group_id {
                Some(group_id) => Some(
                    self.groups
                        .iter()
                        .find(|g| g.id == group_id)
                        .cloned()
                        .ok_or_else(|| {
                            CoordinatorError::Internal(format!(
                                "worker {} references unknown group {}",
                                worker.name, group_id
                            ))
                        })?,
                ),
                None => None,
            };
            let identity = WorkerIdentity {
                worker_id: worker.id.clone(),
                worker_name: worker.name.clone(),
                group,
            };
            sessions.insert(session, identity);
            db.insert_worker(worker).await;
        }
        Ok(())
    }
}
