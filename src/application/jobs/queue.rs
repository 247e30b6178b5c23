//! Persistent, ordered batch queue.
//!
//! Batches are built in memory with [`TaskQueue::push`], written to the
//! [`QueueStore`] by [`TaskQueue::save`] and picked up by a background runner
//! after [`TaskQueue::dispatch`]. Tasks inside a batch run one at a time, in
//! order. A failing task is retried in place until the retry policy gives up,
//! so a dispatch task never starts before the generate tasks ahead of it have
//! either succeeded or been abandoned.

use std::sync::{Arc, Mutex};

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cache::mutex_lock;
use crate::domain::types::TaskState;

use super::error::{QueueError, TaskError};
use super::executor::TaskExecutor;
use super::policy::{AbandonPolicy, RetryPolicy};
use super::store::QueueStore;
use super::task::{TaskBatch, TaskDescriptor, TaskKind};
use super::worker::BackgroundRunner;

const SOURCE: &str = "application::jobs::queue";
const METRIC_TASK_ATTEMPTS: &str = "folio_task_attempts_total";
const METRIC_TASK_ABANDONED: &str = "folio_task_abandoned_total";
const METRIC_TASK_MS: &str = "folio_task_ms";
const METRIC_QUEUE_BATCHES: &str = "folio_queue_batches";

/// Result of handling the front task of a batch.
#[derive(Debug)]
pub enum Step {
    /// Tasks remain; hand the batch back for the next step.
    Remaining(TaskBatch),
    Done,
}

/// What became of the task handled by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Retrying { attempts: u32 },
    Abandoned,
    Skipped,
    Empty,
}

/// Totals of one [`TaskQueue::run_pending`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub batches: usize,
    pub succeeded: usize,
    pub retried: usize,
    pub abandoned: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Succeeded => self.succeeded += 1,
            StepOutcome::Retrying { .. } => self.retried += 1,
            StepOutcome::Abandoned => self.abandoned += 1,
            StepOutcome::Skipped => self.skipped += 1,
            StepOutcome::Empty => {}
        }
    }
}

pub struct TaskQueue {
    store: Arc<dyn QueueStore>,
    runner: Arc<dyn BackgroundRunner>,
    policy: RetryPolicy,
    pushed: Mutex<Vec<TaskBatch>>,
    run_lock: tokio::sync::Mutex<()>,
}

impl TaskQueue {
    pub fn new(
        store: Arc<dyn QueueStore>,
        runner: Arc<dyn BackgroundRunner>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            runner,
            policy,
            pushed: Mutex::new(Vec::new()),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Stage a batch in memory. Nothing is persisted until [`Self::save`].
    pub fn push(&self, batch: TaskBatch) {
        debug!(
            target = SOURCE,
            op = "push",
            batch_id = %batch.id,
            label = %batch.label,
            tasks = batch.len(),
            "Batch staged"
        );
        mutex_lock(&self.pushed, SOURCE, "push").push(batch);
    }

    /// Append every staged batch to the store. On failure they stay staged.
    pub async fn save(&self) -> Result<(), QueueError> {
        let staged = std::mem::take(&mut *mutex_lock(&self.pushed, SOURCE, "save"));
        let saved = self.save_batches(&staged).await;
        if let Err(err) = saved {
            let mut pushed = mutex_lock(&self.pushed, SOURCE, "save");
            let later = std::mem::replace(&mut *pushed, staged);
            pushed.extend(later);
            return Err(err);
        }
        Ok(())
    }

    /// Append `batches` to the store without touching anything staged by
    /// other callers.
    pub async fn save_batches(&self, batches: &[TaskBatch]) -> Result<(), QueueError> {
        if batches.is_empty() {
            return Ok(());
        }

        let mut total = 0;
        self.store
            .update(&mut |saved: &mut Vec<TaskBatch>| {
                saved.extend_from_slice(batches);
                total = saved.len();
            })
            .await?;

        gauge!(METRIC_QUEUE_BATCHES).set(total as f64);
        info!(
            target = SOURCE,
            op = "save",
            saved = batches.len(),
            queued = total,
            "Batches saved"
        );
        Ok(())
    }

    /// Ask the background runner to start processing.
    pub fn dispatch(&self) {
        debug!(target = SOURCE, op = "dispatch", "Waking background runner");
        self.runner.wake();
    }

    /// True when nothing is saved or staged.
    pub async fn is_empty(&self) -> Result<bool, QueueError> {
        if !mutex_lock(&self.pushed, SOURCE, "is_empty").is_empty() {
            return Ok(false);
        }
        Ok(self.store.load().await?.is_empty())
    }

    /// Saved batches in execution order.
    pub async fn snapshot(&self) -> Result<Vec<TaskBatch>, QueueError> {
        self.store.load().await
    }

    /// Handle the front task of `batch`.
    pub async fn step(&self, batch: TaskBatch, executor: &dyn TaskExecutor) -> Step {
        self.step_with_outcome(batch, executor).await.0
    }

    async fn step_with_outcome(
        &self,
        mut batch: TaskBatch,
        executor: &dyn TaskExecutor,
    ) -> (Step, StepOutcome) {
        let Some(mut task) = batch.tasks.pop_front() else {
            return (Step::Done, StepOutcome::Empty);
        };

        let outcome = if self.should_skip(&batch, &task) {
            warn!(
                target = SOURCE,
                op = "step",
                batch_id = %batch.id,
                task_id = %task.id,
                state = TaskState::Skipped.as_str(),
                abandoned_generations = batch.abandoned_generations,
                on_abandon = self.policy.on_abandon.as_str(),
                "Skipping dispatch after abandoned generation"
            );
            StepOutcome::Skipped
        } else {
            self.attempt(&mut batch, &mut task, executor).await
        };

        if let StepOutcome::Retrying { .. } = outcome {
            batch.tasks.push_front(task);
        }

        if batch.tasks.is_empty() {
            (Step::Done, outcome)
        } else {
            (Step::Remaining(batch), outcome)
        }
    }

    fn should_skip(&self, batch: &TaskBatch, task: &TaskDescriptor) -> bool {
        task.kind() == TaskKind::Dispatch
            && batch.abandoned_generations > 0
            && self.policy.on_abandon == AbandonPolicy::SkipDispatch
    }

    async fn attempt(
        &self,
        batch: &mut TaskBatch,
        task: &mut TaskDescriptor,
        executor: &dyn TaskExecutor,
    ) -> StepOutcome {
        let started_at = Instant::now();
        let kind = task.kind().as_str();
        counter!(METRIC_TASK_ATTEMPTS, "kind" => kind).increment(1);

        let result = match self.policy.task_timeout {
            Some(limit) => tokio::time::timeout(limit, executor.execute(task))
                .await
                .unwrap_or(Err(TaskError::TimedOut(limit))),
            None => executor.execute(task).await,
        };
        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        histogram!(METRIC_TASK_MS, "kind" => kind).record(elapsed_ms as f64);

        let err = match result {
            Ok(()) => {
                info!(
                    target = SOURCE,
                    op = "step",
                    batch_id = %batch.id,
                    task_id = %task.id,
                    kind,
                    state = TaskState::Succeeded.as_str(),
                    attempt = task.attempts + 1,
                    elapsed_ms,
                    "Task finished"
                );
                return StepOutcome::Succeeded;
            }
            Err(err) => err,
        };

        task.attempts += 1;
        if self.policy.allows_retry(task.attempts) {
            warn!(
                target = SOURCE,
                op = "step",
                batch_id = %batch.id,
                task_id = %task.id,
                kind,
                state = TaskState::Failed.as_str(),
                attempts = task.attempts,
                max_attempts = self.policy.max_attempts.get(),
                error_code = err.code(),
                error = %err,
                elapsed_ms,
                "Task failed; will retry"
            );
            return StepOutcome::Retrying {
                attempts: task.attempts,
            };
        }

        if task.kind() == TaskKind::Generate {
            batch.abandoned_generations += 1;
        }
        counter!(METRIC_TASK_ABANDONED, "kind" => kind).increment(1);
        error!(
            target = SOURCE,
            op = "step",
            batch_id = %batch.id,
            task_id = %task.id,
            kind,
            state = TaskState::Abandoned.as_str(),
            attempts = task.attempts,
            error_code = err.code(),
            error = %err,
            elapsed_ms,
            "Task abandoned after exhausting attempts"
        );
        StepOutcome::Abandoned
    }

    /// Drain every saved batch, front to back.
    ///
    /// Only one drain runs at a time per store, across processes. The batch
    /// is written back after each step, so a crash resumes at the first
    /// unfinished task.
    pub async fn run_pending(&self, executor: &dyn TaskExecutor) -> Result<RunSummary, QueueError> {
        let _running = self.run_lock.lock().await;
        let _lease = self.store.lease_drain().await?;
        let started_at = Instant::now();
        let mut summary = RunSummary::default();

        while let Some(mut batch) = self.front_batch().await? {
            summary.batches += 1;
            let batch_id = batch.id;
            debug!(
                target = SOURCE,
                op = "run_pending",
                batch_id = %batch_id,
                label = %batch.label,
                tasks = batch.len(),
                "Processing batch"
            );

            loop {
                let (step, outcome) = self.step_with_outcome(batch, executor).await;
                summary.record(outcome);
                match step {
                    Step::Remaining(rest) => {
                        self.replace_batch(&rest).await?;
                        batch = rest;
                    }
                    Step::Done => {
                        self.remove_batch(batch_id).await?;
                        break;
                    }
                }
            }
        }

        if summary.batches > 0 {
            info!(
                target = SOURCE,
                op = "run_pending",
                batches = summary.batches,
                succeeded = summary.succeeded,
                retried = summary.retried,
                abandoned = summary.abandoned,
                skipped = summary.skipped,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "Queue drained"
            );
        }
        Ok(summary)
    }

    async fn front_batch(&self) -> Result<Option<TaskBatch>, QueueError> {
        Ok(self.store.load().await?.into_iter().next())
    }

    async fn replace_batch(&self, batch: &TaskBatch) -> Result<(), QueueError> {
        self.store
            .update(&mut |saved: &mut Vec<TaskBatch>| {
                if let Some(slot) = saved.iter_mut().find(|queued| queued.id == batch.id) {
                    *slot = batch.clone();
                }
            })
            .await
    }

    async fn remove_batch(&self, batch_id: Uuid) -> Result<(), QueueError> {
        let mut remaining = 0;
        self.store
            .update(&mut |saved: &mut Vec<TaskBatch>| {
                saved.retain(|queued| queued.id != batch_id);
                remaining = saved.len();
            })
            .await?;
        gauge!(METRIC_QUEUE_BATCHES).set(remaining as f64);
        Ok(())
    }
}
