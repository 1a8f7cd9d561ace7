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

/// Install a global tracing subscriber using the provided logging settings and
/// describe the print pipeline metrics.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "scoreprint_tasks_submitted_total",
            Unit::Count,
            "Total number of print tasks accepted by the queue."
        );
        describe_counter!(
            "scoreprint_tasks_finished_total",
            Unit::Count,
            "Total number of print tasks that reached a terminal state, by status."
        );
        describe_counter!(
            "scoreprint_delivery_attempts_total",
            Unit::Count,
            "Total number of delivery attempts, by outcome."
        );
        describe_histogram!(
            "scoreprint_render_ms",
            Unit::Milliseconds,
            "Result document render latency in milliseconds."
        );
        describe_gauge!(
            "scoreprint_queue_depth",
            Unit::Count,
            "Print tasks waiting in the queue."
        );
    });
}
