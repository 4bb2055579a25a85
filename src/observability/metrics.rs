//! Metrics collection and exposition.
//!
//! # Metrics
//! - `healthcheck_backend_up_ratio` (gauge): share of healthy servers per pool
//! - `healthcheck_server_up` (gauge): 1=healthy, 0=unhealthy, per server
//!
//! # Design Decisions
//! - The engine depends on the [`ServerUpGauge`] contract only, so tests and
//!   embedders can plug their own sink
//! - Labels: `service` (pool name) and `url`

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Gauge sink written once per tick for each backend pool.
pub trait ServerUpGauge: Send + Sync {
    fn set(&self, backend: &str, value: f64);
}

/// [`ServerUpGauge`] backed by the global `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusGauge;

impl ServerUpGauge for PrometheusGauge {
    fn set(&self, backend: &str, value: f64) {
        metrics::gauge!("healthcheck_backend_up_ratio", "service" => backend.to_string())
            .set(value);
    }
}

/// Publish the probe outcome of a single server.
pub fn record_server_up(service: &str, url: &str, up: bool) {
    metrics::gauge!(
        "healthcheck_server_up",
        "service" => service.to_string(),
        "url" => url.to_string()
    )
    .set(if up { 1.0 } else { 0.0 });
}

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}
