//! Worker-facing pipelines: log stream ingestion and result reporting.

pub mod logs;
pub mod result;

pub use logs::{Inbound, LogIngester};
pub use result::ResultProcessor;
