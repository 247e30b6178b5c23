use std::{io::ErrorKind, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::CacheKey;

use super::{context::JobWorkerContext, error::TaskError};

const SOURCE: &str = "application::jobs::reclaim";

/// How many cache directories one reclaim task removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReclaimMode {
    /// Every directory of the entry.
    #[default]
    All,
    /// Stop after the first directory removed.
    First,
}

impl ReclaimMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReclaimMode::All => "all",
            ReclaimMode::First => "first",
        }
    }
}

/// Remove cached artifacts of an entry after it was updated or deleted.
///
/// With the form still available only directories of its persisted
/// documents are considered; otherwise every directory carrying the entry
/// prefix is. The fingerprint part of the name is ignored, so directories
/// produced from older versions of the entry are found too.
pub async fn process_reclaim_task(
    ctx: &JobWorkerContext,
    form_id: u64,
    entry_id: u64,
) -> Result<(), TaskError> {
    let prefixes: Option<Vec<String>> = ctx.forms.find_form(form_id).await?.map(|form| {
        form.persisted_documents()
            .map(|settings| ctx.addresser.settings_prefix(form_id, entry_id, &settings.id))
            .collect()
    });
    let entry_prefix = ctx.addresser.entry_prefix(form_id, entry_id);

    let candidates = cached_directories(ctx, |name| match &prefixes {
        Some(prefixes) => prefixes
            .iter()
            .any(|prefix| CacheKey::is_keyed_by(name, prefix)),
        None => CacheKey::belongs_to_entry(name, &entry_prefix),
    })
    .await?;

    let mut removed = 0usize;
    for directory in &candidates {
        match tokio::fs::remove_dir_all(directory).await {
            Ok(()) => {
                removed += 1;
                debug!(
                    target = SOURCE,
                    directory = %directory.display(),
                    "Removed cache directory"
                );
                if ctx.reclaim_mode == ReclaimMode::First {
                    break;
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(TaskError::io(directory, err)),
        }
    }

    info!(
        target = SOURCE,
        form_id,
        entry_id,
        mode = ctx.reclaim_mode.as_str(),
        form_known = prefixes.is_some(),
        candidates = candidates.len(),
        removed,
        "Reclaimed cached artifacts"
    );
    Ok(())
}

/// Directories directly under the site root whose names satisfy `matches`,
/// sorted by name.
async fn cached_directories(
    ctx: &JobWorkerContext,
    matches: impl Fn(&str) -> bool,
) -> Result<Vec<PathBuf>, TaskError> {
    let site_root = ctx.addresser.site_root();
    let mut reader = match tokio::fs::read_dir(&site_root).await {
        Ok(reader) => reader,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(TaskError::io(site_root, err)),
    };

    let mut found = Vec::new();
    while let Some(item) = reader
        .next_entry()
        .await
        .map_err(|err| TaskError::io(&site_root, err))?
    {
        let name = item.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let is_dir = item
            .file_type()
            .await
            .map(|kind| kind.is_dir())
            .unwrap_or(false);
        if is_dir && matches(name) {
            found.push(item.path());
        }
    }
    found.sort();
    Ok(found)
}
