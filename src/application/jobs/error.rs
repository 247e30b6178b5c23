use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::application::{notify::DispatchError, render::RenderError, repos::RepoError};
use crate::cache::CacheError;
use crate::domain::error::DomainError;

/// Why a single task attempt failed. Never escapes the queue: a failed
/// attempt is retried or abandoned.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("filesystem operation on `{path}` failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("task timed out after {0:?}")]
    TimedOut(Duration),
    #[error("task failed: {0}")]
    Failed(String),
}

impl TaskError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable label for logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            TaskError::Repo(_) => "repository",
            TaskError::Domain(_) => "domain",
            TaskError::Cache(_) => "cache",
            TaskError::Render(_) => "render",
            TaskError::Dispatch(_) => "dispatch",
            TaskError::Io { .. } => "io",
            TaskError::TimedOut(_) => "timeout",
            TaskError::Failed(_) => "failed",
        }
    }
}

/// Failures of the queue storage itself.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue storage `{path}` failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("queue storage holds invalid data: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("queue storage error: {0}")]
    Storage(String),
}

impl QueueError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
