//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod queue_file;
pub mod storage;
pub mod telemetry;
