//! Result reporting against the in-memory stores.
//!
//! Covers the at-most-once terminal transition, all-or-nothing commits and
//! the checks that run before any store is touched.


use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use jobwire::auth::WorkerIdentity;
use jobwire::codec::DecodeError;
use jobwire::error::CoordinatorError;
use jobwire::model::{Group, Job, JobId, JobStatus, ProjectContext, SpawnInfo, WorkerStatus};
use jobwire::queue::ResultProcessor;
use jobwire::store::{
    JobStore, LockedJob, MemoryDatabase, SpawnInfoStore, StoreError, Stores, Transaction,
};
use prost_types::Timestamp;
use test_harness::*;
use tonic::Code;

struct CountingJobs {
    inner: Arc<MemoryDatabase>,
    calls: AtomicUsize,
}

#[async_trait]
impl JobStore for CountingJobs {
    async fn load_and_lock_no_wait(&self, job_id: JobId) -> Result<LockedJob, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.load_and_lock_no_wait(job_id).await
    }

    async fn update_status(
        &self,
        tx: &mut Transaction,
        job: &Job,
        status: JobStatus,
    ) -> Result<Job, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        JobStore::update_status(self.inner.as_ref(), tx, job, status).await
    }
}

struct FailingSpawnInfos;

#[async_trait]
impl SpawnInfoStore for FailingSpawnInfos {
    async fn append(
        &self,
        _tx: &mut Transaction,
        _context: &ProjectContext,
        _job_id: JobId,
        _infos: Vec<SpawnInfo>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Backend("spawn info table unavailable".to_string()))
    }
}

async fn assert_untouched(db: &MemoryDatabase) {
    let job = db.job(JOB_ID).await.unwrap();
    assert_eq!(job.status, JobStatus::Building);
    assert!(job.done_at.is_none());
    assert_eq!(
        db.worker(WORKER_ID).await.unwrap().status,
        WorkerStatus::Building
    );
    assert!(db.spawn_infos(JOB_ID).await.is_empty());
    assert!(!db.locks().is_locked(JOB_ID));
}

#[tokio::test]
async fn test_worker_reports_success() {
    let db = seeded_database().await;
    let processor = ResultProcessor::new(Stores::memory(db.clone()));

    let job = processor
        .process(&worker_w(), job_result(JOB_ID, "Success", "1m2s"))
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Success);

    let stored = db.job(JOB_ID).await.unwrap();
    assert_eq!(stored.status, JobStatus::Success);
    assert!(stored.done_at.is_some());
    assert_eq!(
        db.worker(WORKER_ID).await.unwrap().status,
        WorkerStatus::Waiting
    );

    let infos = db.spawn_infos(JOB_ID).await;
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].project_key, PROJECT_KEY);
    assert_eq!(infos[0].message.args, vec!["W".to_string(), "1m2s".to_string()]);
    assert_eq!(infos[0].message.to_string(), "W finished working after 1m2s");
    assert_eq!(infos[0].remote_time, remote_time());

    assert!(!db.locks().is_locked(JOB_ID));
}

#[tokio::test]
async fn test_second_report_finds_no_job() {
    let db = seeded_database().await;
    let processor = ResultProcessor::new(Stores::memory(db.clone()));

    processor
        .process(&worker_w(), job_result(JOB_ID, "Fail", "3s"))
        .await
        .unwrap();
    let err = processor
        .process(&worker_w(), job_result(JOB_ID, "Success", "4s"))
        .await
        .unwrap_err();

    assert!(matches!(err, CoordinatorError::JobNotFound(JOB_ID)));
    assert_eq!(db.job(JOB_ID).await.unwrap().status, JobStatus::Fail);
    assert_eq!(db.spawn_infos(JOB_ID).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reports_commit_once() {
    let db = seeded_database().await;
    let processor = ResultProcessor::new(Stores::memory(db.clone()));

    let mut handles = Vec::new();
    for i in 0..8 {
        let processor = processor.clone();
        handles.push(tokio::spawn(async move {
            processor
                .process(&worker_w(), job_result(JOB_ID, "Success", &format!("{i}s")))
                .await
        }));
    }

    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(CoordinatorError::JobLocked(_)) | Err(CoordinatorError::JobNotFound(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(db.spawn_infos(JOB_ID).await.len(), 1);
    assert_eq!(db.job(JOB_ID).await.unwrap().status, JobStatus::Success);
    assert!(!db.locks().is_locked(JOB_ID));
}

#[tokio::test]
async fn test_locked_job_fails_fast() {
    let db = seeded_database().await;
    let processor = ResultProcessor::new(Stores::memory(db.clone()));

    let held = db.locks().try_lock(JOB_ID).unwrap();
    let err = processor
        .process(&worker_w(), job_result(JOB_ID, "Success", "1s"))
        .await
        .unwrap_err();

    assert!(matches!(err, CoordinatorError::JobLocked(JOB_ID)));
    assert!(err.is_retryable());
    assert_eq!(tonic::Status::from(err).code(), Code::Aborted);
    assert_eq!(db.job(JOB_ID).await.unwrap().status, JobStatus::Building);

    drop(held);
    assert!(processor
        .process(&worker_w(), job_result(JOB_ID, "Success", "1s"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_spawn_info_failure_rolls_back_everything() {
    let db = seeded_database().await;
    let stores = Stores {
        spawn_infos: Arc::new(FailingSpawnInfos),
        ..Stores::memory(db.clone())
    };
    let processor = ResultProcessor::new(stores);

    let err = processor
        .process(&worker_w(), job_result(JOB_ID, "Success", "1s"))
        .await
        .unwrap_err();

    match &err {
        CoordinatorError::Store { operation, job_id, .. } => {
            assert_eq!(*operation, "save spawn info");
            assert_eq!(*job_id, JOB_ID);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(tonic::Status::from(err).code(), Code::Internal);
    // the staged worker update is discarded too
    assert_untouched(&db).await;
}

#[tokio::test]
async fn test_invalid_remote_time_rolls_back() {
    let db = seeded_database().await;
    let processor = ResultProcessor::new(Stores::memory(db.clone()));

    let mut result = job_result(JOB_ID, "Success", "1s");
    result.remote_time = Some(Timestamp {
        seconds: 10,
        nanos: 2_000_000_000,
    });
    let err = processor.process(&worker_w(), result).await.unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::Decode(DecodeError::InvalidTimestamp { .. })
    ));
    assert_eq!(tonic::Status::from(err).code(), Code::InvalidArgument);
    assert_untouched(&db).await;

    let mut result = job_result(JOB_ID, "Success", "1s");
    result.remote_time = None;
    let err = processor.process(&worker_w(), result).await.unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::Decode(DecodeError::MissingRemoteTime)
    ));
    assert_untouched(&db).await;
}

#[tokio::test]
async fn test_incomplete_identity_never_reaches_store() {
    let db = seeded_database().await;
    let jobs = Arc::new(CountingJobs {
        inner: db.clone(),
        calls: AtomicUsize::new(0),
    });
    let stores = Stores {
        jobs: jobs.clone(),
        ..Stores::memory(db.clone())
    };
    let processor = ResultProcessor::new(stores);

    for caller in [
        WorkerIdentity::new("", WORKER_NAME),
        WorkerIdentity::new(WORKER_ID, ""),
    ] {
        let err = processor
            .process(&caller, job_result(JOB_ID, "Success", "1s"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Forbidden));
        assert_eq!(tonic::Status::from(err).code(), Code::PermissionDenied);
    }

    assert_eq!(jobs.calls.load(Ordering::SeqCst), 0);
    assert_untouched(&db).await;
}

#[tokio::test]
async fn test_malformed_envelope_is_rejected_before_locking() {
    let db = seeded_database().await;
    let processor = ResultProcessor::new(Stores::memory(db.clone()));

    let cases = [
        (job_result(JOB_ID, "Done", "1s"), "unknown status"),
        (job_result(JOB_ID, "Building", "1s"), "non terminal"),
        (job_result(0, "Success", "1s"), "missing id"),
    ];
    for (result, case) in cases {
        let err = processor.process(&worker_w(), result).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Decode(_)), "{case}: {err}");
    }
    assert_untouched(&db).await;
}

#[tokio::test]
async fn test_unknown_worker_still_commits() {
    let db = seeded_database().await;
    let processor = ResultProcessor::new(Stores::memory(db.clone()));

    let ghost = WorkerIdentity::new("w-ghost", "ghost").with_group(builders());
    processor
        .process(&ghost, job_result(JOB_ID, "Stopped", "0s"))
        .await
        .unwrap();

    assert_eq!(db.job(JOB_ID).await.unwrap().status, JobStatus::Stopped);
    assert!(db.worker("w-ghost").await.is_none());
    // W was not the reporter and keeps its status
    assert_eq!(
        db.worker(WORKER_ID).await.unwrap().status,
        WorkerStatus::Building
    );
    let infos = db.spawn_infos(JOB_ID).await;
    assert_eq!(infos[0].message.args[0], "ghost");
}

#[tokio::test]
async fn test_foreign_group_is_denied() {
    let db = seeded_database().await;
    let processor = ResultProcessor::new(Stores::memory(db.clone()));

    let outsider = WorkerIdentity::new(WORKER_ID, WORKER_NAME).with_group(Group {
        id: 99,
        name: "outsiders".to_string(),
    });
    let err = processor
        .process(&outsider, job_result(JOB_ID, "Success", "1s"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoordinatorError::Store {
            source: StoreError::PermissionDenied { .. },
            ..
        }
    ));
    assert_eq!(tonic::Status::from(err).code(), Code::PermissionDenied);
    assert_untouched(&db).await;
}

#[tokio::test]
async fn test_shared_worker_without_group_is_allowed() {
    let db = seeded_database().await;
    let processor = ResultProcessor::new(Stores::memory(db.clone()));

    let shared = WorkerIdentity::new(WORKER_ID, WORKER_NAME);
    processor
        .process(&shared, job_result(JOB_ID, "Success", "5s"))
        .await
        .unwrap();
    assert_eq!(db.job(JOB_ID).await.unwrap().status, JobStatus::Success);
}
