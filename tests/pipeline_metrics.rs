use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use folio::application::jobs::{
    ExternalRunner, JobWorkerContext, MemoryQueueStore, ReclaimMode, RetryPolicy, TaskQueue,
};
use folio::application::notify::{DispatchError, Dispatcher, resolve_attachments};
use folio::application::orchestration::{BatchOrchestrator, DispatchGate, TriggerEvent};
use folio::application::render::{RenderError, Renderer};
use folio::application::repos::{EntriesRepo, FormsRepo};
use folio::cache::{AddressContext, CacheAddresser, CacheConfig, GenerationLocks};
use folio::domain::entities::{DocumentSettings, EntryRecord, FormDefinition, NotificationTarget};
use folio::infra::storage::JsonFileRepository;
use metrics_util::debugging::DebuggingRecorder;
use serde_json::json;

struct StubRenderer;

#[async_trait]
impl Renderer for StubRenderer {
    async fn render(
        &self,
        _form: &FormDefinition,
        entry: &EntryRecord,
        settings: &DocumentSettings,
        destination: &Path,
    ) -> Result<(), RenderError> {
        let body = format!("{} for entry {}", settings.id, entry.id);
        tokio::fs::write(destination, body)
            .await
            .map_err(RenderError::Io)?;
        Ok(())
    }
}

struct RecordingDispatcher {
    addresser: CacheAddresser,
    sent: Mutex<Vec<(String, Vec<PathBuf>)>>,
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
        self.sent
            .lock()
            .expect("sent")
            .push((notification.id.clone(), attachments.present));
        Ok(())
    }
}

fn write_records(root: &Path) {
    fs::create_dir_all(root.join("forms")).expect("forms dir");
    fs::create_dir_all(root.join("entries")).expect("entries dir");
    let form = json!({
        "id": 3,
        "title": "Order",
        "fields": [{"id": "1", "type": "text", "label": "Name"}],
        "notifications": [{"id": "admin", "name": "Admin"}],
        "documents": [
            {"id": "inv", "template": "invoice", "filename": "invoice", "notifications": ["admin"]}
        ]
    });
    let entry = json!({"id": 12, "form_id": 3, "1": "Ada"});
    fs::write(root.join("forms/3.json"), form.to_string()).expect("form");
    fs::write(root.join("entries/12.json"), entry.to_string()).expect("entry");
}

#[tokio::test]
async fn submitted_entry_is_rendered_once_and_dispatched_with_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let dir = tempfile::tempdir().expect("tempdir");
    write_records(&dir.path().join("data"));

    let repository = Arc::new(JsonFileRepository::new(dir.path().join("data")));
    let addresser = CacheAddresser::new(
        CacheConfig::default()
            .with_root(dir.path().join("cache"))
            .with_templates_dir(dir.path().join("templates")),
        AddressContext::new(1, 0),
    );
    let dispatcher = Arc::new(RecordingDispatcher {
        addresser: addresser.clone(),
        sent: Mutex::new(Vec::new()),
    });
    let context = JobWorkerContext {
        forms: repository.clone(),
        entries: repository.clone(),
        renderer: Arc::new(StubRenderer),
        dispatcher: dispatcher.clone(),
        addresser: addresser.clone(),
        locks: GenerationLocks::new(),
        reclaim_mode: ReclaimMode::All,
    };
    let queue = Arc::new(TaskQueue::new(
        Arc::new(MemoryQueueStore::new()),
        Arc::new(ExternalRunner),
        RetryPolicy::default(),
    ));
    let orchestrator = BatchOrchestrator::new(DispatchGate::default(), Arc::clone(&queue));

    let form = repository.find_form(3).await.expect("read form").expect("form");
    let entry = repository.find_entry(12).await.expect("read entry").expect("entry");
    let event = TriggerEvent::entry_created(3, 12);

    for _ in 0..2 {
        let outcome = orchestrator.build_and_enqueue(&event, &form, &entry).await;
        assert_eq!(outcome.handled, vec!["admin".to_string()]);
        let summary = queue.run_pending(&context).await.expect("run");
        assert_eq!(summary.succeeded, 2);
    }

    let artifact = addresser
        .path_for(&form, &entry, form.document("inv").expect("document"))
        .expect("location")
        .artifact;
    assert_eq!(
        fs::read_to_string(&artifact).expect("artifact"),
        "inv for entry 12"
    );

    let sent = dispatcher.sent.lock().expect("sent").clone();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(id, files)| id == "admin" && files == &vec![artifact.clone()]));

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "folio_task_attempts_total",
        "folio_task_ms",
        "folio_cache_hit_total",
        "folio_cache_miss_total",
        "folio_render_ms",
        "folio_queue_batches",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
