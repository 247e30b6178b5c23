//! In-memory collaborators shared by unit tests.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use serde_json::json;

use crate::application::jobs::JobWorkerContext;
use crate::application::jobs::ReclaimMode;
use crate::application::notify::{DispatchError, Dispatcher, resolve_attachments};
use crate::application::render::{RenderError, Renderer};
use crate::application::repos::{EntriesRepo, FormsRepo, RepoError};
use crate::cache::{AddressContext, CacheAddresser, CacheConfig, GenerationLocks, mutex_lock};
use crate::domain::entities::{DocumentSettings, EntryRecord, FormDefinition, NotificationTarget};

#[derive(Default)]
pub(crate) struct MemoryRepo {
    forms: Mutex<HashMap<u64, FormDefinition>>,
    entries: Mutex<HashMap<u64, EntryRecord>>,
}

impl MemoryRepo {
    pub(crate) fn put_form(&self, form: FormDefinition) {
        mutex_lock(&self.forms, "testing", "put_form").insert(form.id, form);
    }

    pub(crate) fn put_entry(&self, entry: EntryRecord) {
        mutex_lock(&self.entries, "testing", "put_entry").insert(entry.id, entry);
    }

    pub(crate) fn remove_form(&self, id: u64) {
        mutex_lock(&self.forms, "testing", "remove_form").remove(&id);
    }

    pub(crate) fn remove_entry(&self, id: u64) {
        mutex_lock(&self.entries, "testing", "remove_entry").remove(&id);
    }
}

#[async_trait]
impl FormsRepo for MemoryRepo {
    async fn find_form(&self, id: u64) -> Result<Option<FormDefinition>, RepoError> {
        Ok(mutex_lock(&self.forms, "testing", "find_form").get(&id).cloned())
    }
}

#[async_trait]
impl EntriesRepo for MemoryRepo {
    async fn find_entry(&self, id: u64) -> Result<Option<EntryRecord>, RepoError> {
        Ok(mutex_lock(&self.entries, "testing", "find_entry")
            .get(&id)
            .cloned())
    }
}

/// Writes the settings id into the destination; fails for listed templates.
#[derive(Default)]
pub(crate) struct RecordingRenderer {
    pub(crate) calls: AtomicUsize,
    failing_templates: Vec<String>,
}

impl RecordingRenderer {
    pub(crate) fn failing(template: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing_templates: vec![template.to_string()],
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for RecordingRenderer {
    async fn render(
        &self,
        _form: &FormDefinition,
        _entry: &EntryRecord,
        settings: &DocumentSettings,
        destination: &Path,
    ) -> Result<(), RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_templates.contains(&settings.template) {
            return Err(RenderError::Document {
                message: format!("template {} is broken", settings.template),
            });
        }
        tokio::fs::write(destination, settings.id.as_bytes())
            .await
            .map_err(RenderError::Io)
    }
}

/// Records every send together with the attachments found at that moment.
pub(crate) struct RecordingDispatcher {
    addresser: CacheAddresser,
    sent: Mutex<Vec<(String, Vec<PathBuf>)>>,
}

impl RecordingDispatcher {
    pub(crate) fn new(addresser: CacheAddresser) -> Self {
        Self {
            addresser,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn sent(&self) -> Vec<(String, Vec<PathBuf>)> {
        mutex_lock(&self.sent, "testing", "sent").clone()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn send(
        &self,
        notification: &NotificationTarget,
        form: &FormDefinition,
        entry: &EntryRecord,
    ) -> Result<(), DispatchError> {
        let attachments = resolve_attachments(&self.addresser, notification, form, entry)?;
        mutex_lock(&self.sent, "testing", "send")
            .push((notification.id.clone(), attachments.present));
        Ok(())
    }
}

/// Form 3 with notifications `a` (documents `inv`, `receipt`) and `b`
/// (document `summary`).
pub(crate) fn sample_form() -> FormDefinition {
    serde_json::from_value(json!({
        "id": 3,
        "title": "Order",
        "fields": [
            {"id": "1", "type": "text", "label": "Name"},
            {"id": "2", "type": "number", "label": "Total"}
        ],
        "notifications": [
            {"id": "a", "name": "Admin"},
            {"id": "b", "name": "Customer"}
        ],
        "documents": [
            {"id": "inv", "template": "invoice", "filename": "invoice",
             "notifications": ["a"]},
            {"id": "receipt", "template": "receipt", "filename": "receipt",
             "notifications": ["a"]},
            {"id": "summary", "template": "summary", "filename": "summary",
             "notifications": ["b"]}
        ]
    }))
    .expect("sample form")
}

pub(crate) fn sample_entry() -> EntryRecord {
    serde_json::from_value(json!({"id": 12, "form_id": 3, "1": "Ada", "2": "42"}))
        .expect("sample entry")
}

/// Wired-up context over a temporary cache root.
pub(crate) struct Harness {
    pub(crate) repo: Arc<MemoryRepo>,
    pub(crate) renderer: Arc<RecordingRenderer>,
    pub(crate) dispatcher: Arc<RecordingDispatcher>,
    pub(crate) addresser: CacheAddresser,
    pub(crate) context: JobWorkerContext,
}

impl Harness {
    pub(crate) fn new(root: &Path, renderer: RecordingRenderer, mode: ReclaimMode) -> Self {
        let addresser = CacheAddresser::new(
            CacheConfig::default()
                .with_root(root.join("cache"))
                .with_templates_dir(root.join("templates")),
            AddressContext::new(1, 0),
        );
        let repo = Arc::new(MemoryRepo::default());
        repo.put_form(sample_form());
        repo.put_entry(sample_entry());
        let renderer = Arc::new(renderer);
        let dispatcher = Arc::new(RecordingDispatcher::new(addresser.clone()));
        let context = JobWorkerContext {
            forms: repo.clone(),
            entries: repo.clone(),
            renderer: renderer.clone(),
            dispatcher: dispatcher.clone(),
            addresser: addresser.clone(),
            locks: GenerationLocks::new(),
            reclaim_mode: mode,
        };
        Self {
            repo,
            renderer,
            dispatcher,
            addresser,
            context,
        }
    }

    pub(crate) fn artifact(&self, settings_id: &str) -> PathBuf {
        let form = sample_form();
        let entry = sample_entry();
        let settings = form.document(settings_id).expect("settings");
        self.addresser
            .path_for(&form, &entry, settings)
            .expect("location")
            .artifact
    }
}
