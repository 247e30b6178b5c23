use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "folio_task_attempts_total",
            Unit::Count,
            "Total number of task attempts, by task kind."
        );
        describe_counter!(
            "folio_task_abandoned_total",
            Unit::Count,
            "Total number of tasks dropped after exhausting their attempts."
        );
        describe_histogram!(
            "folio_task_ms",
            Unit::Milliseconds,
            "Task attempt latency in milliseconds."
        );
        describe_counter!(
            "folio_cache_hit_total",
            Unit::Count,
            "Total number of generate tasks that found their artifact cached."
        );
        describe_counter!(
            "folio_cache_miss_total",
            Unit::Count,
            "Total number of generate tasks that rendered a new artifact."
        );
        describe_histogram!(
            "folio_render_ms",
            Unit::Milliseconds,
            "Document rendering latency in milliseconds."
        );
        describe_gauge!(
            "folio_queue_batches",
            Unit::Count,
            "Current number of saved batches."
        );
    });
}
