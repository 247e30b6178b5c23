use metrics::{counter, histogram};
use tokio::time::Instant;
use tracing::{error, info};

use crate::{cache::CacheError, domain::error::DomainError};

use super::{context::JobWorkerContext, error::TaskError};

const SOURCE: &str = "application::jobs::generate";
const METRIC_CACHE_HIT: &str = "folio_cache_hit_total";
const METRIC_CACHE_MISS: &str = "folio_cache_miss_total";
const METRIC_RENDER_MS: &str = "folio_render_ms";

/// Produce the artifact for one document of one entry, unless the cache
/// already holds it.
///
/// Form, entry and settings are read fresh, so the location reflects the
/// data as it is now. Generation for the same cache key is serialized; a
/// task that waited behind a duplicate finds the artifact and returns.
pub async fn process_generate_task(
    ctx: &JobWorkerContext,
    form_id: u64,
    entry_id: u64,
    settings_id: &str,
) -> Result<(), TaskError> {
    let started_at = Instant::now();
    let entry = ctx.load_entry(form_id, entry_id).await?;
    let form = ctx.load_form(form_id).await?;
    let settings = form
        .document(settings_id)
        .ok_or_else(|| DomainError::not_found("document settings", settings_id))?;

    let location = ctx.addresser.path_for(&form, &entry, settings)?;
    let _guard = ctx.locks.acquire(&location.key.dir_name()).await;

    if tokio::fs::try_exists(&location.artifact)
        .await
        .unwrap_or(false)
    {
        counter!(METRIC_CACHE_HIT).increment(1);
        info!(
            target = SOURCE,
            form_id,
            entry_id,
            settings_id,
            result = "cache_hit",
            cache_key = %location.key,
            "Artifact already cached"
        );
        return Ok(());
    }

    tokio::fs::create_dir_all(&location.directory)
        .await
        .map_err(|err| CacheError::io(&location.directory, err))?;

    let render_started_at = Instant::now();
    if let Err(err) = ctx
        .renderer
        .render(&form, &entry, settings, &location.artifact)
        .await
    {
        error!(
            target = SOURCE,
            form_id,
            entry_id,
            settings_id,
            cache_key = %location.key,
            template = %settings.template,
            error = %err,
            "Document generation failed"
        );
        return Err(err.into());
    }

    let render_ms = render_started_at.elapsed().as_secs_f64() * 1000.0;
    counter!(METRIC_CACHE_MISS).increment(1);
    histogram!(METRIC_RENDER_MS).record(render_ms);
    info!(
        target = SOURCE,
        form_id,
        entry_id,
        settings_id,
        result = "cache_miss",
        cache_key = %location.key,
        artifact = %location.artifact.display(),
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        "Artifact generated"
    );
    Ok(())
}
