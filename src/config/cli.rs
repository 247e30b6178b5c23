use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the Folio binary.
#[derive(Debug, Parser)]
#[command(
    name = "folio",
    version,
    about = "Queued document generation and notification delivery"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the cache location of one document of an entry.
    Path(PathArgs),
    /// Queue the notifications of a newly submitted entry.
    Enqueue(EnqueueArgs),
    /// Queue selected notifications of an entry again.
    Resend(ResendArgs),
    /// Queue removal of an entry's cached documents.
    Reclaim(ReclaimArgs),
    /// Run queued tasks.
    Work(WorkArgs),
    /// Show queued batches.
    Status(StatusArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the cache root directory.
    #[arg(long = "cache-root", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub cache_root: Option<PathBuf>,

    /// Override the directory holding form and entry records.
    #[arg(long = "storage-directory", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub storage_directory: Option<PathBuf>,

    /// Override the queue file.
    #[arg(long = "queue-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub queue_path: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct EntryArgs {
    /// Form id.
    #[arg(long = "form", value_name = "ID")]
    pub form_id: u64,

    /// Entry id.
    #[arg(long = "entry", value_name = "ID")]
    pub entry_id: u64,
}

#[derive(Debug, Args, Clone)]
pub struct PathArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    #[command(flatten)]
    pub entry: EntryArgs,

    /// Document settings id.
    #[arg(long = "document", value_name = "ID")]
    pub document_id: String,
}

#[derive(Debug, Args, Clone)]
pub struct EnqueueArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    #[command(flatten)]
    pub entry: EntryArgs,

    /// The host already sends notifications in the background.
    #[arg(long = "host-async", action = clap::ArgAction::SetTrue)]
    pub host_async: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ResendArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    #[command(flatten)]
    pub entry: EntryArgs,

    /// Notification ids to resend; repeat for several.
    #[arg(long = "notification", value_name = "ID", required = true)]
    pub notification_ids: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ReclaimArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    #[command(flatten)]
    pub entry: EntryArgs,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WorkArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Keep running and poll the queue instead of exiting once it is drained.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub watch: bool,

    /// Override the polling interval used with --watch.
    #[arg(long = "queue-poll-interval-ms", value_name = "MILLIS")]
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,
}

impl Command {
    pub fn overrides(&self) -> &CommonOverrides {
        match self {
            Command::Path(args) => &args.overrides,
            Command::Enqueue(args) => &args.overrides,
            Command::Resend(args) => &args.overrides,
            Command::Reclaim(args) => &args.overrides,
            Command::Work(args) => &args.overrides,
            Command::Status(args) => &args.overrides,
        }
    }
}
