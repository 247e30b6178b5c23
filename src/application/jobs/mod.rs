mod context;
mod dispatch;
mod error;
mod executor;
mod generate;
mod policy;
mod queue;
mod reclaim;
mod store;
mod task;
mod worker;

#[cfg(test)]
mod tests;

pub use context::JobWorkerContext;
pub use dispatch::process_dispatch_task;
pub use error::{QueueError, TaskError};
pub use executor::TaskExecutor;
pub use generate::process_generate_task;
pub use policy::{AbandonPolicy, DEFAULT_MAX_ATTEMPTS, RetryPolicy};
pub use queue::{RunSummary, Step, StepOutcome, TaskQueue};
pub use reclaim::{ReclaimMode, process_reclaim_task};
pub use store::{DrainLease, MemoryQueueStore, QueueStore};
pub use task::{TaskBatch, TaskDescriptor, TaskKind, TaskTarget};
pub use worker::{BackgroundRunner, ExternalRunner, QueueWorker};
