use async_trait::async_trait;

use super::error::TaskError;
use super::task::TaskDescriptor;

/// Runs one attempt of one task.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &TaskDescriptor) -> Result<(), TaskError>;
}
