use std::net::SocketAddr;
use std::path::PathBuf;

/// Default bound of the channel between a log stream and its ingestion task.
pub const DEFAULT_LOG_CHANNEL_CAPACITY: usize = 64;

/// Default cap on stored log lines per job.
pub const DEFAULT_MAX_LOG_ENTRIES_PER_JOB: usize = 100_000;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub listen_addr: SocketAddr,
    /// Messages buffered per open log stream before the reader is suspended.
    pub log_channel_capacity: usize,
    pub max_log_entries_per_job: usize,
    /// JSON file with projects, node runs, workers and jobs loaded at startup.
    pub seed_path: Option<PathBuf>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 50051)),
            log_channel_capacity: DEFAULT_LOG_CHANNEL_CAPACITY,
            max_log_entries_per_job: DEFAULT_MAX_LOG_ENTRIES_PER_JOB,
            seed_path: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_log_channel_capacity(mut self, capacity: usize) -> Self {
        self.log_channel_capacity = capacity.max(1);
        self
    }

    pub fn with_max_log_entries_per_job(mut self, limit: usize) -> Self {
        self.max_log_entries_per_job = limit;
        self
    }

    pub fn with_seed(mut self, path: impl Into<PathBuf>) -> Self {
        self.seed_path = Some(path.into());
        self
    }
}
