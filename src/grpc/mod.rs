pub mod build_log_service;
pub mod server;
mod stream;
pub mod workflow_queue_service;

pub use build_log_service::BuildLogService;
pub use server::GrpcServer;
pub use workflow_queue_service::WorkflowQueueService;
