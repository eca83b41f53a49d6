//! Prometheus Metrics Module
//!
//! Counters for stream health: frames consumed, decode failures, transport
//! failures, and reconnection attempts.

use std::sync::OnceLock;

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

fn register_metrics() {
    describe_counter!(
        "eruditefx_stream_frames_total",
        "Total frames decoded and appended to the event log"
    );
    describe_counter!(
        "eruditefx_stream_decode_errors_total",
        "Total frames dropped because they failed to decode"
    );
    describe_counter!(
        "eruditefx_stream_transport_errors_total",
        "Total transport-level stream failures"
    );
    describe_counter!(
        "eruditefx_stream_reconnects_total",
        "Total stream reconnection attempts"
    );
}
