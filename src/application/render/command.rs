use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    process::Stdio,
    time::Instant,
};

use async_trait::async_trait;
use serde_json::json;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{info, warn};

use crate::cache::CacheConfig;
use crate::domain::entities::{DocumentSettings, EntryRecord, FormDefinition};

use super::types::{RenderError, Renderer};

const SOURCE: &str = "application::render::command";

/// Renders documents by invoking an external program.
///
/// The program is called as
/// `<program> <args..> --template <path> --input <payload.json> --output <path>`
/// and must write the finished artifact to the output path. Output goes to a
/// temporary file next to the destination and is renamed into place on
/// success, so a failed run never leaves a partial artifact behind.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: PathBuf,
    args: Vec<String>,
    templates: CacheConfig,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, templates: CacheConfig) -> Self {
        Self {
            program: program.into(),
            args,
            templates,
        }
    }

    fn payload(
        form: &FormDefinition,
        entry: &EntryRecord,
        settings: &DocumentSettings,
    ) -> Result<NamedTempFile, RenderError> {
        let payload = json!({
            "form": form.canonical()?,
            "entry": entry,
            "settings": settings,
        });
        let mut file = NamedTempFile::new().map_err(RenderError::Io)?;
        serde_json::to_writer(&mut file, &payload)?;
        file.flush().map_err(RenderError::Io)?;
        Ok(file)
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(
        &self,
        form: &FormDefinition,
        entry: &EntryRecord,
        settings: &DocumentSettings,
        destination: &Path,
    ) -> Result<(), RenderError> {
        let started_at = Instant::now();
        let input_file = Self::payload(form, entry, settings)?;

        let parent = destination.parent().unwrap_or_else(|| Path::new("."));
        let suffix = destination
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let output_file = tempfile::Builder::new()
            .prefix(".render-")
            .suffix(&suffix)
            .tempfile_in(parent)
            .map_err(RenderError::Io)?;
        let output_path = output_file.path().to_path_buf();

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--template")
            .arg(self.templates.template_path(&settings.template))
            .arg("--input")
            .arg(input_file.path())
            .arg("--output")
            .arg(&output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                warn!(
                    target = SOURCE,
                    op = "render",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = "spawn_cli",
                    program = %self.program.display(),
                    error = %err,
                    "Failed to spawn renderer"
                );
                if err.kind() == ErrorKind::NotFound {
                    RenderError::NotFound(err)
                } else {
                    RenderError::Io(err)
                }
            })?;

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(
                target = SOURCE,
                op = "render",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "renderer_cli",
                stderr = %stderr,
                "Renderer invocation failed"
            );
            return Err(RenderError::Cli { exit_code, stderr });
        }

        let written = output_file
            .as_file()
            .metadata()
            .map_err(RenderError::Io)?
            .len();
        if written == 0 {
            return Err(RenderError::MissingOutput {
                path: destination.display().to_string(),
            });
        }

        output_file
            .persist(destination)
            .map_err(|err| RenderError::Io(err.error))?;

        info!(
            target = SOURCE,
            op = "render",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            artifact = %destination.display(),
            artifact_bytes = written,
            "Document rendered"
        );
        Ok(())
    }
}
