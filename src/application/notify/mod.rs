//! Notification delivery interface.
//!
//! The dispatch task hands a notification to a [`Dispatcher`] once every
//! generate task ahead of it in the batch has finished. Attachments are
//! found again through the cache addresser, never passed along the queue.

mod command;

use std::{io, path::PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::cache::{CacheAddresser, CacheError};
use crate::domain::entities::{EntryRecord, FormDefinition, NotificationTarget};

pub use command::CommandDispatcher;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to prepare dispatch: {0}")]
    Io(#[source] io::Error),
    #[error("failed to encode dispatch payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("dispatcher invocation failed (exit {exit_code:?}): {stderr}")]
    Cli {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("dispatcher unavailable: {0}")]
    NotFound(#[source] io::Error),
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(
        &self,
        notification: &NotificationTarget,
        form: &FormDefinition,
        entry: &EntryRecord,
    ) -> Result<(), DispatchError>;
}

/// Artifacts a notification would carry for one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachments {
    pub present: Vec<PathBuf>,
    /// Expected artifacts that were not on disk, typically because their
    /// generate task was abandoned.
    pub missing: Vec<PathBuf>,
}

/// Resolve the attachment paths of `notification` in attachment order.
pub fn resolve_attachments(
    addresser: &CacheAddresser,
    notification: &NotificationTarget,
    form: &FormDefinition,
    entry: &EntryRecord,
) -> Result<Attachments, CacheError> {
    let mut attachments = Attachments::default();
    for settings in form.attachments_for(&notification.id, entry) {
        let location = addresser.path_for(form, entry, settings)?;
        if location.artifact.is_file() {
            attachments.present.push(location.artifact);
        } else {
            warn!(
                target = "application::notify",
                op = "resolve_attachments",
                form_id = form.id,
                entry_id = entry.id,
                notification_id = %notification.id,
                settings_id = %settings.id,
                artifact = %location.artifact.display(),
                "Attachment missing from cache; sending without it"
            );
            attachments.missing.push(location.artifact);
        }
    }
    Ok(attachments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{AddressContext, CacheConfig};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn splits_present_and_missing_artifacts() {
        let dir = TempDir::new().expect("temp dir");
        let addresser = CacheAddresser::new(
            CacheConfig::default()
                .with_root(dir.path())
                .with_templates_dir(dir.path().join("templates")),
            AddressContext::new(1, 0),
        );
        let form: FormDefinition = serde_json::from_value(json!({
            "id": 3,
            "title": "Order",
            "notifications": [{"id": "admin"}],
            "documents": [
                {"id": "a", "template": "t", "filename": "a", "notifications": ["admin"]},
                {"id": "b", "template": "t", "filename": "b", "notifications": ["admin"]}
            ]
        }))
        .expect("form");
        let entry: EntryRecord =
            serde_json::from_value(json!({"id": 12, "form_id": 3})).expect("entry");
        let notification = form.notification("admin").expect("notification");

        let first = addresser
            .path_for(&form, &entry, form.document("a").expect("doc"))
            .expect("location");
        fs::create_dir_all(&first.directory).expect("mkdir");
        fs::write(&first.artifact, b"pdf").expect("write");

        let attachments =
            resolve_attachments(&addresser, notification, &form, &entry).expect("resolve");
        assert_eq!(attachments.present, vec![first.artifact]);
        assert_eq!(attachments.missing.len(), 1);
        assert!(attachments.missing[0].ends_with("b.pdf"));
    }
}
