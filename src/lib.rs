pub mod auth;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod grpc;
pub mod model;
pub mod queue;
pub mod shutdown;
pub mod store;

// Re-export generated protobuf types
pub mod proto {
    tonic::include_proto!("queue");
}
