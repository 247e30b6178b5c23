use std::any::Any;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cache::mutex_lock;

use super::error::QueueError;
use super::task::TaskBatch;

/// Durable home of saved batches.
///
/// Several processes may share one store: `update` is the only way to write
/// and must exclude every other writer for the whole load-change-write step.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn load(&self) -> Result<Vec<TaskBatch>, QueueError>;

    /// Load the saved batches, let `apply` change them, then write them back.
    async fn update(
        &self,
        apply: &mut (dyn for<'a> FnMut(&'a mut Vec<TaskBatch>) + Send),
    ) -> Result<(), QueueError>;

    /// Exclusive right to drain the queue, held until the lease drops.
    async fn lease_drain(&self) -> Result<DrainLease, QueueError> {
        Ok(DrainLease::default())
    }
}

/// Proof that the holder is the only drain running against a store.
#[derive(Default)]
pub struct DrainLease {
    _held: Option<Box<dyn Any + Send>>,
}

impl DrainLease {
    /// Lease that stays valid while `held` (typically a locked file) lives.
    pub fn holding(held: impl Any + Send) -> Self {
        Self {
            _held: Some(Box::new(held)),
        }
    }
}

/// Keeps batches for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    batches: Mutex<Vec<TaskBatch>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn load(&self) -> Result<Vec<TaskBatch>, QueueError> {
        Ok(mutex_lock(&self.batches, "application::jobs::store", "load").clone())
    }

    async fn update(
        &self,
        apply: &mut (dyn for<'a> FnMut(&'a mut Vec<TaskBatch>) + Send),
    ) -> Result<(), QueueError> {
        apply(&mut mutex_lock(&self.batches, "application::jobs::store", "update"));
        Ok(())
    }
}
