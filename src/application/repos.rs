//! Repository traits describing persistence adapters.
//!
//! Forms and entries are owned by the host system; this crate only reads
//! them. Tasks carry identifiers and re-read the records when they run.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{EntryRecord, FormDefinition};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("record `{id}` could not be decoded: {message}")]
    Decode { id: String, message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait FormsRepo: Send + Sync {
    async fn find_form(&self, id: u64) -> Result<Option<FormDefinition>, RepoError>;
}

#[async_trait]
pub trait EntriesRepo: Send + Sync {
    async fn find_entry(&self, id: u64) -> Result<Option<EntryRecord>, RepoError>;
}
