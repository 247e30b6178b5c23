use std::{
    io::{ErrorKind, Write},
    path::PathBuf,
    process::Stdio,
    time::Instant,
};

use async_trait::async_trait;
use serde_json::json;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{info, warn};

use crate::cache::CacheAddresser;
use crate::domain::entities::{EntryRecord, FormDefinition, NotificationTarget};

use super::{DispatchError, Dispatcher, resolve_attachments};

const SOURCE: &str = "application::notify::command";

/// Delivers notifications through an external program.
///
/// Invoked as `<program> <args..> --input <payload.json> [--attachment <path>]..`
/// where the payload holds the notification, form and entry.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    program: PathBuf,
    args: Vec<String>,
    addresser: CacheAddresser,
}

impl CommandDispatcher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, addresser: CacheAddresser) -> Self {
        Self {
            program: program.into(),
            args,
            addresser,
        }
    }
}

#[async_trait]
impl Dispatcher for CommandDispatcher {
    async fn send(
        &self,
        notification: &NotificationTarget,
        form: &FormDefinition,
        entry: &EntryRecord,
    ) -> Result<(), DispatchError> {
        let started_at = Instant::now();
        let attachments = resolve_attachments(&self.addresser, notification, form, entry)?;

        let mut input_file = NamedTempFile::new().map_err(DispatchError::Io)?;
        serde_json::to_writer(
            &mut input_file,
            &json!({
                "notification": notification,
                "form": form.canonical()?,
                "entry": entry,
            }),
        )?;
        input_file.flush().map_err(DispatchError::Io)?;

        let mut command = Command::new(&self.program);
        command.args(&self.args).arg("--input").arg(input_file.path());
        for path in &attachments.present {
            command.arg("--attachment").arg(path);
        }

        let output = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                if err.kind() == ErrorKind::NotFound {
                    DispatchError::NotFound(err)
                } else {
                    DispatchError::Io(err)
                }
            })?;

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(
                target = SOURCE,
                op = "send",
                result = "error",
                notification_id = %notification.id,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                stderr = %stderr,
                "Dispatcher invocation failed"
            );
            return Err(DispatchError::Cli { exit_code, stderr });
        }

        info!(
            target = SOURCE,
            op = "send",
            result = "ok",
            form_id = form.id,
            entry_id = entry.id,
            notification_id = %notification.id,
            attachments = attachments.present.len(),
            missing_attachments = attachments.missing.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Notification dispatched"
        );
        Ok(())
    }
}
