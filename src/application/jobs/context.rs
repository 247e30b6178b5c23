use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    application::{
        notify::Dispatcher,
        render::Renderer,
        repos::{EntriesRepo, FormsRepo},
    },
    cache::{CacheAddresser, GenerationLocks},
    domain::{
        entities::{EntryRecord, FormDefinition},
        error::DomainError,
    },
};

use super::{
    dispatch::process_dispatch_task, error::TaskError, executor::TaskExecutor,
    generate::process_generate_task, reclaim::ReclaimMode, reclaim::process_reclaim_task,
    task::TaskDescriptor, task::TaskTarget,
};

/// Shared context passed to task executors so they can reach the host data,
/// the cache and the external collaborators.
#[derive(Clone)]
pub struct JobWorkerContext {
    pub forms: Arc<dyn FormsRepo>,
    pub entries: Arc<dyn EntriesRepo>,
    pub renderer: Arc<dyn Renderer>,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub addresser: CacheAddresser,
    pub locks: GenerationLocks,
    pub reclaim_mode: ReclaimMode,
}

impl JobWorkerContext {
    pub(crate) async fn load_form(&self, form_id: u64) -> Result<FormDefinition, TaskError> {
        self.forms
            .find_form(form_id)
            .await?
            .ok_or_else(|| DomainError::not_found("form", form_id).into())
    }

    /// Entry by id, checked to belong to `form_id`.
    pub(crate) async fn load_entry(
        &self,
        form_id: u64,
        entry_id: u64,
    ) -> Result<EntryRecord, TaskError> {
        let entry = self
            .entries
            .find_entry(entry_id)
            .await?
            .ok_or_else(|| DomainError::not_found("entry", entry_id))?;
        if entry.form_id != form_id {
            return Err(DomainError::mismatch("entry", entry_id, form_id).into());
        }
        Ok(entry)
    }
}

#[async_trait]
impl TaskExecutor for JobWorkerContext {
    async fn execute(&self, task: &TaskDescriptor) -> Result<(), TaskError> {
        match &task.target {
            TaskTarget::Generate {
                form_id,
                entry_id,
                settings_id,
            } => process_generate_task(self, *form_id, *entry_id, settings_id).await,
            TaskTarget::Dispatch {
                form_id,
                entry_id,
                notification_id,
            } => process_dispatch_task(self, *form_id, *entry_id, notification_id).await,
            TaskTarget::Reclaim { form_id, entry_id } => {
                process_reclaim_task(self, *form_id, *entry_id).await
            }
        }
    }
}
