//! Turns host events into queued batches.
//!
//! For every notification the [`DispatchGate`] takes over, one batch is
//! built: a generate task per attached document, in attachment order, then
//! the dispatch task. Notifications left to the host are reported back so
//! the host keeps sending them itself.

mod gate;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::application::jobs::{TaskBatch, TaskQueue};
use crate::domain::entities::{EntryRecord, FormDefinition};

pub use gate::{DispatchGate, GateDecision};

const SOURCE: &str = "application::orchestration";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerKind {
    /// A new entry was submitted.
    EntryCreated,
    /// An operator asked to resend the listed notifications.
    ManualResend { notification_ids: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub form_id: u64,
    pub entry_id: u64,
    pub kind: TriggerKind,
    /// The host already sends notifications in the background.
    pub host_async_dispatch: bool,
}

impl TriggerEvent {
    pub fn entry_created(form_id: u64, entry_id: u64) -> Self {
        Self {
            form_id,
            entry_id,
            kind: TriggerKind::EntryCreated,
            host_async_dispatch: false,
        }
    }

    pub fn manual_resend(form_id: u64, entry_id: u64, notification_ids: Vec<String>) -> Self {
        Self {
            form_id,
            entry_id,
            kind: TriggerKind::ManualResend { notification_ids },
            host_async_dispatch: false,
        }
    }

    pub fn with_host_async_dispatch(mut self, enabled: bool) -> Self {
        self.host_async_dispatch = enabled;
        self
    }
}

/// Which notifications the queue took over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnqueueOutcome {
    /// Handled asynchronously; the host must not send these itself.
    pub handled: Vec<String>,
    /// Left to the host.
    pub skipped: Vec<String>,
}

impl EnqueueOutcome {
    /// True when every notification was left to the host, or there were none.
    pub fn nothing_handled(&self) -> bool {
        self.handled.is_empty()
    }
}

pub struct BatchOrchestrator {
    gate: DispatchGate,
    queue: Arc<TaskQueue>,
}

impl BatchOrchestrator {
    pub fn new(gate: DispatchGate, queue: Arc<TaskQueue>) -> Self {
        Self { gate, queue }
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    /// Batches for every eligible notification, paired with its id.
    pub fn build_batches(
        &self,
        event: &TriggerEvent,
        form: &FormDefinition,
        entry: &EntryRecord,
    ) -> (Vec<(String, TaskBatch)>, Vec<String>) {
        let selected: Option<&[String]> = match &event.kind {
            TriggerKind::EntryCreated => None,
            TriggerKind::ManualResend { notification_ids } => Some(notification_ids),
        };

        let mut batches = Vec::new();
        let mut skipped = Vec::new();
        for notification in &form.notifications {
            if selected.is_some_and(|ids| !ids.contains(&notification.id)) {
                continue;
            }
            if !self.gate.should_handle_async(event, notification, entry) {
                skipped.push(notification.id.clone());
                continue;
            }
            let batch = TaskBatch::for_notification(
                form.id,
                entry.id,
                &notification.id,
                form.attachments_for(&notification.id, entry)
                    .map(|settings| settings.id.as_str()),
            );
            debug!(
                target = SOURCE,
                form_id = form.id,
                entry_id = entry.id,
                notification_id = %notification.id,
                tasks = batch.len(),
                "Built batch"
            );
            batches.push((notification.id.clone(), batch));
        }
        (batches, skipped)
    }

    /// Handle a new entry. Saving and waking the runner happen whether or not
    /// any batch was built.
    pub async fn build_and_enqueue(
        &self,
        event: &TriggerEvent,
        form: &FormDefinition,
        entry: &EntryRecord,
    ) -> EnqueueOutcome {
        let (batches, outcome) = self.prepare(event, form, entry);
        let outcome = self.persist(batches, outcome).await;
        self.queue.dispatch();
        outcome
    }

    /// Operator resend of selected notifications. The runner is only woken
    /// when there is something to run.
    pub async fn build_and_enqueue_manual(
        &self,
        event: &TriggerEvent,
        form: &FormDefinition,
        entry: &EntryRecord,
    ) -> EnqueueOutcome {
        let (batches, outcome) = self.prepare(event, form, entry);
        let outcome = self.persist(batches, outcome).await;
        match self.queue.is_empty().await {
            Ok(false) => self.queue.dispatch(),
            Ok(true) => debug!(
                target = SOURCE,
                op = "build_and_enqueue_manual",
                "Nothing queued; runner not woken"
            ),
            Err(err) => warn!(
                target = SOURCE,
                op = "build_and_enqueue_manual",
                error = %err,
                "Could not inspect queue; runner not woken"
            ),
        }
        outcome
    }

    /// Queue removal of an entry's cached artifacts after an update or delete.
    pub async fn enqueue_reclaim(&self, form_id: u64, entry_id: u64) -> bool {
        match self.queue.save_batches(&[TaskBatch::reclaim(form_id, entry_id)]).await {
            Ok(()) => {
                self.queue.dispatch();
                true
            }
            Err(err) => {
                error!(
                    target = SOURCE,
                    op = "enqueue_reclaim",
                    form_id,
                    entry_id,
                    error = %err,
                    "Failed to queue reclaim"
                );
                false
            }
        }
    }

    fn prepare(
        &self,
        event: &TriggerEvent,
        form: &FormDefinition,
        entry: &EntryRecord,
    ) -> (Vec<TaskBatch>, EnqueueOutcome) {
        let (built, skipped) = self.build_batches(event, form, entry);
        let mut batches = Vec::with_capacity(built.len());
        let mut handled = Vec::with_capacity(built.len());
        for (notification_id, batch) in built {
            batches.push(batch);
            handled.push(notification_id);
        }
        (batches, EnqueueOutcome { handled, skipped })
    }

    /// Save this call's batches. On failure they fall back to the host.
    async fn persist(&self, batches: Vec<TaskBatch>, outcome: EnqueueOutcome) -> EnqueueOutcome {
        match self.queue.save_batches(&batches).await {
            Ok(()) => {
                if !outcome.handled.is_empty() {
                    info!(
                        target = SOURCE,
                        handled = ?outcome.handled,
                        skipped = ?outcome.skipped,
                        "Notifications queued"
                    );
                }
                outcome
            }
            Err(err) => {
                error!(
                    target = SOURCE,
                    op = "save",
                    dropped = batches.len(),
                    error = %err,
                    "Failed to save batches; leaving notifications to the host"
                );
                let mut skipped = outcome.skipped;
                skipped.extend(outcome.handled);
                EnqueueOutcome {
                    handled: Vec::new(),
                    skipped,
                }
            }
        }
    }
}
