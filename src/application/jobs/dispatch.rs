use tracing::info;

use crate::domain::error::DomainError;

use super::{context::JobWorkerContext, error::TaskError};

/// Send one notification for an entry. Attachments are located by the
/// dispatcher through the cache addresser.
pub async fn process_dispatch_task(
    ctx: &JobWorkerContext,
    form_id: u64,
    entry_id: u64,
    notification_id: &str,
) -> Result<(), TaskError> {
    let form = ctx.load_form(form_id).await?;
    let entry = ctx.load_entry(form_id, entry_id).await?;
    let notification = form
        .notification(notification_id)
        .ok_or_else(|| DomainError::not_found("notification", notification_id))?;

    info!(
        target = "application::jobs::dispatch",
        form_id,
        entry_id,
        notification_id,
        "Dispatching notification"
    );
    ctx.dispatcher.send(notification, &form, &entry).await?;
    Ok(())
}
