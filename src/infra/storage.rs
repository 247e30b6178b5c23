//! Filesystem-backed form and entry records.
//!
//! Records are JSON documents laid out as `<root>/forms/<id>.json` and
//! `<root>/entries/<id>.json`, as exported by the host.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::debug;

use crate::application::repos::{EntriesRepo, FormsRepo, RepoError};
use crate::domain::entities::{EntryRecord, FormDefinition};

const FORMS_DIR: &str = "forms";
const ENTRIES_DIR: &str = "entries";

#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    root: PathBuf,
}

impl JsonFileRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, kind: &str, id: u64) -> PathBuf {
        self.root.join(kind).join(format!("{id}.json"))
    }

    async fn read_record<T: DeserializeOwned>(
        &self,
        kind: &str,
        id: u64,
    ) -> Result<Option<T>, RepoError> {
        let path = self.record_path(kind, id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    target = "infra::storage",
                    path = %path.display(),
                    "Record not found"
                );
                return Ok(None);
            }
            Err(err) => return Err(RepoError::from_persistence(err)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| RepoError::Decode {
                id: format!("{kind}/{id}"),
                message: err.to_string(),
            })
    }
}

#[async_trait]
impl FormsRepo for JsonFileRepository {
    async fn find_form(&self, id: u64) -> Result<Option<FormDefinition>, RepoError> {
        let form: Option<FormDefinition> = self.read_record(FORMS_DIR, id).await?;
        match form {
            Some(form) if form.id != id => Err(RepoError::InvalidInput {
                message: format!("form file {id} holds form {}", form.id),
            }),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl EntriesRepo for JsonFileRepository {
    async fn find_entry(&self, id: u64) -> Result<Option<EntryRecord>, RepoError> {
        let entry: Option<EntryRecord> = self.read_record(ENTRIES_DIR, id).await?;
        match entry {
            Some(entry) if entry.id != id => Err(RepoError::InvalidInput {
                message: format!("entry file {id} holds entry {}", entry.id),
            }),
            other => Ok(other),
        }
    }
}
