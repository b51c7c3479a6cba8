//! Metric name constants.

use std::time::Duration;

use anyhow::Context;
use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config;

pub const MODERATION_FLAGGED: &str = "miciudad.moderation.flagged"; // Counter.
pub const MODERATION_APPROVED: &str = "miciudad.moderation.approved"; // Counter.
pub const MODERATION_MISMATCH: &str = "miciudad.moderation.mismatch"; // Counter.
pub const MODERATION_IMAGE_UNAVAILABLE: &str = "miciudad.moderation.image_unavailable"; // Counter.

pub const TRACKING_SESSIONS_STARTED: &str = "miciudad.tracking.sessions_started"; // Counter.
pub const TRACKING_PINGS: &str = "miciudad.tracking.pings"; // Counter.
pub const TRACKING_OFF_ROUTE: &str = "miciudad.tracking.off_route"; // Counter.

/// Must be ran exactly once on startup. This will declare all of the instruments for `metrics`.
pub fn setup(config: &Option<config::MetricConfig>) -> anyhow::Result<()> {
    describe_counter!(
        MODERATION_FLAGGED,
        "Submissions flagged by the moderation engine."
    );
    describe_counter!(
        MODERATION_APPROVED,
        "Submissions auto-approved by the moderation engine."
    );
    describe_counter!(
        MODERATION_MISMATCH,
        "Submissions whose image and text were topically inconsistent."
    );
    describe_counter!(
        MODERATION_IMAGE_UNAVAILABLE,
        "Moderation calls that fell back to text-only because the image could not be fetched."
    );

    describe_counter!(
        TRACKING_SESSIONS_STARTED,
        "Driver service sessions started."
    );
    describe_counter!(TRACKING_PINGS, "Driver position pings processed.");
    describe_counter!(
        TRACKING_OFF_ROUTE,
        "Pings that were off the computed route."
    );

    if let Some(config) = config {
        match config {
            config::MetricConfig::PrometheusPush(prometheus_config) => {
                PrometheusBuilder::new()
                    .with_push_gateway(
                        prometheus_config.url.clone(),
                        Duration::from_secs(10),
                        None,
                        None,
                    )
                    .context("failed to set up push gateway")?
                    .install()
                    .context("failed to install metrics exporter")?;
            }
        }
    }

    Ok(())
}
