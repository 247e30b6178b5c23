use std::{io, path::Path};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{DocumentSettings, EntryRecord, FormDefinition};

/// Structured errors surfaced by a document renderer. These map onto task
/// failure reasons without leaking renderer internals.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to prepare render input: {0}")]
    Io(#[source] io::Error),
    #[error("failed to encode render payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("renderer invocation failed (exit {exit_code:?}): {stderr}")]
    Cli {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("renderer unavailable: {0}")]
    NotFound(#[source] io::Error),
    #[error("renderer produced no artifact at `{path}`")]
    MissingOutput { path: String },
    #[error("document rendering failed: {message}")]
    Document { message: String },
}

/// Produces one document artifact from an entry.
///
/// `destination` is the final artifact path inside an existing cache
/// directory. Implementations must leave either a complete file there or
/// nothing at all.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        form: &FormDefinition,
        entry: &EntryRecord,
        settings: &DocumentSettings,
        destination: &Path,
    ) -> Result<(), RenderError>;
}
