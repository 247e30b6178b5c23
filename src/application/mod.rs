//! Application services: queue, task executors and batch orchestration.

pub mod error;
pub mod jobs;
pub mod notify;
pub mod orchestration;
pub mod render;
pub mod repos;

#[cfg(test)]
pub(crate) mod testing;
