//! Request-latency and outcome metrics, optional behind the `prometheus`
//! feature. When the feature is off every function here is a no-op, so
//! call sites never need to branch on whether metrics are enabled.

use std::time::Duration;

/// Record one completed request: its total latency and its final HTTP
/// status/method pair.
#[cfg(feature = "prometheus")]
pub fn record_request(method: &http::Method, status: http::StatusCode, elapsed: Duration) {
    metrics::histogram!("gatekeeper_request_duration_seconds").record(elapsed.as_secs_f64());
    metrics::counter!(
        "gatekeeper_requests_total",
        "method" => method.to_string(),
        "status" => status.as_u16().to_string(),
    )
    .increment(1);
}

#[cfg(not(feature = "prometheus"))]
pub fn record_request(_method: &http::Method, _status: http::StatusCode, _elapsed: Duration) {}

/// Install the process-wide Prometheus recorder and return a handle whose
/// `render()` produces the exposition-format text served on the metrics
/// endpoint. Call once at startup.
#[cfg(feature = "prometheus")]
pub fn install_recorder() -> Result<metrics_exporter_prometheus::PrometheusHandle, anyhow::Error> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    builder
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install prometheus recorder: {e}"))
}
