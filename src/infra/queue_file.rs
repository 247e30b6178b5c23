//! Queue storage in a single JSON file.
//!
//! The file may be shared by several processes (`folio enqueue` next to a
//! `folio work --watch`). Writers serialize on an advisory lock held on
//! `<queue>.lock` for the whole load-change-write step, and drains serialize
//! on `<queue>.drain.lock`.

use std::{
    ffi::OsString,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use tempfile::NamedTempFile;
use tokio::fs::{File, OpenOptions};
use tracing::debug;

use crate::application::jobs::{DrainLease, QueueError, QueueStore, TaskBatch};

const SOURCE: &str = "infra::queue_file";

/// Every write replaces the file atomically, so readers never see a
/// half-written queue.
#[derive(Debug, Clone)]
pub struct FileQueueStore {
    path: PathBuf,
}

impl FileQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sidecar(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }

    async fn write(&self, batches: &[TaskBatch]) -> Result<(), QueueError> {
        let encoded = serde_json::to_vec_pretty(batches)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &encoded))
            .await
            .map_err(|err| QueueError::Storage(format!("queue writer panicked: {err}")))?
    }
}

#[async_trait]
impl QueueStore for FileQueueStore {
    async fn load(&self) -> Result<Vec<TaskBatch>, QueueError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(QueueError::io(&self.path, err)),
        }
    }

    async fn update(
        &self,
        apply: &mut (dyn for<'a> FnMut(&'a mut Vec<TaskBatch>) + Send),
    ) -> Result<(), QueueError> {
        let lock = lock_exclusive(self.sidecar(".lock")).await?;
        let mut batches = self.load().await?;
        apply(&mut batches);
        let written = self.write(&batches).await;
        // Closing the lock file releases the lock.
        drop(lock);
        written
    }

    async fn lease_drain(&self) -> Result<DrainLease, QueueError> {
        let lock = lock_exclusive(self.sidecar(".drain.lock")).await?;
        debug!(
            target = SOURCE,
            op = "lease_drain",
            queue = %self.path.display(),
            "Drain lease acquired"
        );
        Ok(DrainLease::holding(lock))
    }
}

/// Open `path` and wait for an exclusive advisory lock on it.
async fn lock_exclusive(path: PathBuf) -> Result<File, QueueError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| QueueError::io(parent, err))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .await
        .map_err(|err| QueueError::io(&path, err))?;

    tokio::task::spawn_blocking(move || match file.lock_exclusive() {
        Ok(()) => Ok(file),
        Err(err) => Err(QueueError::io(&path, err)),
    })
    .await
    .map_err(|err| QueueError::Storage(format!("queue lock waiter panicked: {err}")))?
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), QueueError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|err| QueueError::io(parent, err))?;

    let mut file = NamedTempFile::new_in(parent).map_err(|err| QueueError::io(parent, err))?;
    file.write_all(bytes)
        .and_then(|()| file.as_file().sync_all())
        .map_err(|err| QueueError::io(file.path(), err))?;
    file.persist(path)
        .map_err(|err| QueueError::io(path, err.error))?;
    Ok(())
}
