use std::io;
use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global subscriber described by `logging`.
///
/// Log records go to stderr so command output on stdout stays parseable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let output = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_target(logging.with_target)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default())
        .with(output)
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("subscriber already installed: {err}")))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "quire_query_cache_hit_total",
            Unit::Count,
            "Total number of query cache reads served from a fresh entry."
        );
        describe_counter!(
            "quire_query_cache_miss_total",
            Unit::Count,
            "Total number of query cache reads that needed a load."
        );
        describe_counter!(
            "quire_query_cache_coalesced_total",
            Unit::Count,
            "Total number of fetches that joined a load already in flight."
        );
        describe_counter!(
            "quire_query_cache_evict_total",
            Unit::Count,
            "Total number of query cache entries dropped, labelled by reason."
        );
        describe_counter!(
            "quire_query_cache_superseded_total",
            Unit::Count,
            "Total number of commits dropped because a newer value was stored."
        );
        describe_counter!(
            "quire_query_cache_load_failed_total",
            Unit::Count,
            "Total number of loads that ended in an error."
        );
    });
}
