use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::{jobs::QueueError, repos::RepoError},
    cache::CacheError,
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Error chain flattened into printable lines, outermost first.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit status, following the BSD `sysexits` conventions.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Validation(_) => 64,
            AppError::Domain(DomainError::NotFound { .. }) => 66,
            AppError::Domain(DomainError::Mismatch { .. }) => 65,
            AppError::Repo(_) => 65,
            AppError::Infra(InfraError::Configuration { .. }) => 78,
            AppError::Infra(_) | AppError::Cache(_) | AppError::Queue(_) => 74,
            AppError::Unexpected(_) => 70,
        }
    }
}
