use std::{process, sync::Arc};

use folio::{
    application::{
        error::{AppError, ErrorReport},
        jobs::{
            BackgroundRunner, ExternalRunner, JobWorkerContext, QueueWorker, RetryPolicy,
            TaskBatch, TaskQueue,
        },
        notify::CommandDispatcher,
        orchestration::{BatchOrchestrator, DispatchGate, TriggerEvent},
        render::CommandRenderer,
        repos::{EntriesRepo, FormsRepo},
    },
    cache::{AddressContext, CacheAddresser, CacheConfig, GenerationLocks},
    config,
    domain::{
        entities::{EntryRecord, FormDefinition},
        error::DomainError,
    },
    infra::{
        error::InfraError, queue_file::FileQueueStore, storage::JsonFileRepository, telemetry,
    },
};
use serde::Serialize;
use serde_json::json;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(i32::from(error.exit_code()));
    }
}

fn report_application_error(error: &AppError) {
    let report = ErrorReport::from_error("main", error);
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?report.messages, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?report.messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::Infra(InfraError::configuration(err.to_string())))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let app = Application::build(&settings);
    match cli_args.command {
        config::Command::Path(args) => run_path(&app, args).await,
        config::Command::Enqueue(args) => run_enqueue(&app, args).await,
        config::Command::Resend(args) => run_resend(&app, args).await,
        config::Command::Reclaim(args) => run_reclaim(&app, args).await,
        config::Command::Work(args) => run_work(&app, &settings, args).await,
        config::Command::Status(_) => run_status(&app).await,
    }
}

/// Everything a command needs, wired from the settings.
struct Application {
    repository: Arc<JsonFileRepository>,
    addresser: CacheAddresser,
    context: JobWorkerContext,
    store: Arc<FileQueueStore>,
    policy: RetryPolicy,
}

impl Application {
    fn build(settings: &config::Settings) -> Self {
        let cache_config = CacheConfig::from(settings);
        let addresser = CacheAddresser::new(
            cache_config.clone(),
            AddressContext::new(settings.cache.site_id, settings.cache.user_id),
        );
        let repository = Arc::new(JsonFileRepository::new(&settings.storage.directory));
        let renderer = CommandRenderer::new(
            &settings.renderer.program,
            settings.renderer.args.clone(),
            cache_config,
        );
        let dispatcher = CommandDispatcher::new(
            &settings.dispatcher.program,
            settings.dispatcher.args.clone(),
            addresser.clone(),
        );

        let context = JobWorkerContext {
            forms: repository.clone(),
            entries: repository.clone(),
            renderer: Arc::new(renderer),
            dispatcher: Arc::new(dispatcher),
            addresser: addresser.clone(),
            locks: GenerationLocks::new(),
            reclaim_mode: settings.reclaim.mode,
        };

        Self {
            repository,
            addresser,
            context,
            store: Arc::new(FileQueueStore::new(&settings.queue.path)),
            policy: RetryPolicy::from(&settings.queue),
        }
    }

    fn queue(&self, runner: Arc<dyn BackgroundRunner>) -> Arc<TaskQueue> {
        Arc::new(TaskQueue::new(self.store.clone(), runner, self.policy))
    }

    fn orchestrator(&self) -> BatchOrchestrator {
        BatchOrchestrator::new(DispatchGate::default(), self.queue(Arc::new(ExternalRunner)))
    }

    async fn load_records(
        &self,
        form_id: u64,
        entry_id: u64,
    ) -> Result<(FormDefinition, EntryRecord), AppError> {
        let form = self
            .repository
            .find_form(form_id)
            .await?
            .ok_or_else(|| DomainError::not_found("form", form_id))?;
        let entry = self
            .repository
            .find_entry(entry_id)
            .await?
            .ok_or_else(|| DomainError::not_found("entry", entry_id))?;
        if entry.form_id != form_id {
            return Err(DomainError::mismatch("entry", entry_id, form_id).into());
        }
        Ok((form, entry))
    }
}

fn print_json(value: &impl Serialize) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{rendered}");
    Ok(())
}

async fn run_path(app: &Application, args: config::PathArgs) -> Result<(), AppError> {
    let (form, entry) = app
        .load_records(args.entry.form_id, args.entry.entry_id)
        .await?;
    let settings = form
        .document(&args.document_id)
        .ok_or_else(|| DomainError::not_found("document settings", &args.document_id))?;
    let location = app.addresser.path_for(&form, &entry, settings)?;

    print_json(&json!({
        "cache_key": location.key.dir_name(),
        "directory": location.directory,
        "artifact": location.artifact,
        "exists": location.artifact.is_file(),
    }))
}

async fn run_enqueue(app: &Application, args: config::EnqueueArgs) -> Result<(), AppError> {
    let (form, entry) = app
        .load_records(args.entry.form_id, args.entry.entry_id)
        .await?;
    let event =
        TriggerEvent::entry_created(form.id, entry.id).with_host_async_dispatch(args.host_async);

    let outcome = app
        .orchestrator()
        .build_and_enqueue(&event, &form, &entry)
        .await;
    print_json(&outcome)
}

async fn run_resend(app: &Application, args: config::ResendArgs) -> Result<(), AppError> {
    let (form, entry) = app
        .load_records(args.entry.form_id, args.entry.entry_id)
        .await?;
    let event = TriggerEvent::manual_resend(form.id, entry.id, args.notification_ids);

    let outcome = app
        .orchestrator()
        .build_and_enqueue_manual(&event, &form, &entry)
        .await;
    print_json(&outcome)
}

async fn run_reclaim(app: &Application, args: config::ReclaimArgs) -> Result<(), AppError> {
    let queued = app
        .orchestrator()
        .enqueue_reclaim(args.entry.form_id, args.entry.entry_id)
        .await;
    if !queued {
        return Err(AppError::unexpected("failed to queue reclaim task"));
    }
    print_json(&json!({ "queued": true }))
}

async fn run_work(
    app: &Application,
    settings: &config::Settings,
    args: config::WorkArgs,
) -> Result<(), AppError> {
    if !args.watch {
        let queue = app.queue(Arc::new(ExternalRunner));
        let summary = queue.run_pending(&app.context).await?;
        return print_json(&summary);
    }

    let worker = QueueWorker::new();
    let queue = app.queue(Arc::new(worker.clone()));
    let handle = worker.spawn(
        Arc::clone(&queue),
        Arc::new(app.context.clone()),
        settings.queue.poll_interval,
    );
    info!(
        queue = %settings.queue.path.display(),
        poll_interval_ms = settings.queue.poll_interval.as_millis() as u64,
        "Worker started"
    );

    let result = tokio::signal::ctrl_c().await;
    handle.abort();
    let _ = handle.await;
    info!("Worker stopped");
    result.map_err(|err| AppError::from(InfraError::from(err)))
}

async fn run_status(app: &Application) -> Result<(), AppError> {
    let batches: Vec<TaskBatch> = app.queue(Arc::new(ExternalRunner)).snapshot().await?;
    print_json(&batches)
}
