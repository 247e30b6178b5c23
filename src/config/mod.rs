//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::jobs::{AbandonPolicy, DEFAULT_MAX_ATTEMPTS, ReclaimMode};

pub use cli::{
    CliArgs, Command, CommonOverrides, EnqueueArgs, EntryArgs, PathArgs, ReclaimArgs, ResendArgs,
    StatusArgs, WorkArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folio";
const DEFAULT_CACHE_ROOT: &str = "cache";
const DEFAULT_ARTIFACT_EXTENSION: &str = "pdf";
const DEFAULT_SITE_ID: u64 = 1;
const DEFAULT_TEMPLATES_DIR: &str = "templates";
const DEFAULT_TEMPLATE_EXTENSION: &str = "html";
const DEFAULT_QUEUE_PATH: &str = "queue.json";
const DEFAULT_QUEUE_POLL_INTERVAL_MS: u64 = 5_000;
const DEFAULT_STORAGE_DIR: &str = "data";
pub(crate) const DEFAULT_RENDERER_PROGRAM: &str = "folio-render";
pub(crate) const DEFAULT_DISPATCHER_PROGRAM: &str = "folio-send";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub templates: TemplateSettings,
    pub queue: QueueSettings,
    pub reclaim: ReclaimSettings,
    pub storage: StorageSettings,
    pub renderer: CommandSettings,
    pub dispatcher: CommandSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub root: PathBuf,
    pub artifact_extension: String,
    pub site_id: u64,
    /// User the worker generates documents as.
    pub user_id: u64,
}

#[derive(Debug, Clone)]
pub struct TemplateSettings {
    pub directory: PathBuf,
    pub code_extension: String,
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub path: PathBuf,
    pub max_attempts: NonZeroU32,
    pub task_timeout_seconds: Option<u64>,
    pub on_abandon: AbandonPolicy,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ReclaimSettings {
    pub mode: ReclaimMode,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub directory: PathBuf,
}

/// An external program and the leading arguments passed to it.
#[derive(Debug, Clone)]
pub struct CommandSettings {
    pub program: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FOLIO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_common_overrides(cli.command.overrides());
    if let Command::Work(args) = &cli.command {
        raw.apply_work_overrides(args);
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    templates: RawTemplateSettings,
    queue: RawQueueSettings,
    reclaim: RawReclaimSettings,
    storage: RawStorageSettings,
    renderer: RawCommandSettings,
    dispatcher: RawCommandSettings,
}

impl RawSettings {
    fn apply_common_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(root) = overrides.cache_root.as_ref() {
            self.cache.root = Some(root.clone());
        }
        if let Some(directory) = overrides.storage_directory.as_ref() {
            self.storage.directory = Some(directory.clone());
        }
        if let Some(path) = overrides.queue_path.as_ref() {
            self.queue.path = Some(path.clone());
        }
    }

    fn apply_work_overrides(&mut self, args: &WorkArgs) {
        if let Some(interval) = args.poll_interval_ms {
            self.queue.poll_interval_ms = Some(interval);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            cache,
            templates,
            queue,
            reclaim,
            storage,
            renderer,
            dispatcher,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            templates: build_template_settings(templates)?,
            queue: build_queue_settings(queue)?,
            reclaim: build_reclaim_settings(reclaim)?,
            storage: build_storage_settings(storage)?,
            renderer: build_command_settings(renderer, DEFAULT_RENDERER_PROGRAM, "renderer.program")?,
            dispatcher: build_command_settings(
                dispatcher,
                DEFAULT_DISPATCHER_PROGRAM,
                "dispatcher.program",
            )?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let root = non_empty_path(cache.root, DEFAULT_CACHE_ROOT, "cache.root")?;
    let artifact_extension = extension(
        cache.artifact_extension,
        DEFAULT_ARTIFACT_EXTENSION,
        "cache.artifact_extension",
    )?;

    Ok(CacheSettings {
        root,
        artifact_extension,
        site_id: cache.site_id.unwrap_or(DEFAULT_SITE_ID),
        user_id: cache.user_id.unwrap_or(0),
    })
}

fn build_template_settings(templates: RawTemplateSettings) -> Result<TemplateSettings, LoadError> {
    Ok(TemplateSettings {
        directory: non_empty_path(
            templates.directory,
            DEFAULT_TEMPLATES_DIR,
            "templates.directory",
        )?,
        code_extension: extension(
            templates.code_extension,
            DEFAULT_TEMPLATE_EXTENSION,
            "templates.code_extension",
        )?,
    })
}

fn build_queue_settings(queue: RawQueueSettings) -> Result<QueueSettings, LoadError> {
    let path = non_empty_path(queue.path, DEFAULT_QUEUE_PATH, "queue.path")?;
    let max_attempts = non_zero_u32(
        queue.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS.into()),
        "queue.max_attempts",
    )?;

    if queue.task_timeout_seconds == Some(0) {
        return Err(LoadError::invalid(
            "queue.task_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let on_abandon = match queue.on_abandon.as_deref().map(str::trim) {
        None | Some("continue") => AbandonPolicy::Continue,
        Some("skip_dispatch") => AbandonPolicy::SkipDispatch,
        Some(other) => {
            return Err(LoadError::invalid(
                "queue.on_abandon",
                format!("expected `continue` or `skip_dispatch`, got `{other}`"),
            ));
        }
    };

    let poll_interval_ms = queue
        .poll_interval_ms
        .unwrap_or(DEFAULT_QUEUE_POLL_INTERVAL_MS);
    if poll_interval_ms == 0 {
        return Err(LoadError::invalid(
            "queue.poll_interval_ms",
            "must be greater than zero",
        ));
    }

    Ok(QueueSettings {
        path,
        max_attempts,
        task_timeout_seconds: queue.task_timeout_seconds,
        on_abandon,
        poll_interval: Duration::from_millis(poll_interval_ms),
    })
}

fn build_reclaim_settings(reclaim: RawReclaimSettings) -> Result<ReclaimSettings, LoadError> {
    let mode = match reclaim.mode.as_deref().map(str::trim) {
        None | Some("all") => ReclaimMode::All,
        Some("first") => ReclaimMode::First,
        Some(other) => {
            return Err(LoadError::invalid(
                "reclaim.mode",
                format!("expected `all` or `first`, got `{other}`"),
            ));
        }
    };
    Ok(ReclaimSettings { mode })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    Ok(StorageSettings {
        directory: non_empty_path(storage.directory, DEFAULT_STORAGE_DIR, "storage.directory")?,
    })
}

fn build_command_settings(
    raw: RawCommandSettings,
    default_program: &str,
    key: &'static str,
) -> Result<CommandSettings, LoadError> {
    Ok(CommandSettings {
        program: non_empty_path(raw.program, default_program, key)?,
        args: raw.args.unwrap_or_default(),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    root: Option<PathBuf>,
    artifact_extension: Option<String>,
    site_id: Option<u64>,
    user_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTemplateSettings {
    directory: Option<PathBuf>,
    code_extension: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawQueueSettings {
    path: Option<PathBuf>,
    max_attempts: Option<u64>,
    task_timeout_seconds: Option<u64>,
    on_abandon: Option<String>,
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawReclaimSettings {
    mode: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCommandSettings {
    program: Option<PathBuf>,
    args: Option<Vec<String>>,
}

fn non_empty_path(
    value: Option<PathBuf>,
    default: &str,
    key: &'static str,
) -> Result<PathBuf, LoadError> {
    let path = value.unwrap_or_else(|| PathBuf::from(default));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid(key, "path must not be empty"));
    }
    Ok(path)
}

fn extension(value: Option<String>, default: &str, key: &'static str) -> Result<String, LoadError> {
    let raw = value.unwrap_or_else(|| default.to_string());
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() || trimmed.contains(['/', '\\']) {
        return Err(LoadError::invalid(
            key,
            "must be a non-empty extension without separators",
        ));
    }
    Ok(trimmed.to_string())
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
