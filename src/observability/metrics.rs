//! Metrics collection and exposition.
//!
//! # Design Decisions
//! - The core never opens its own metrics HTTP listener: per the admin
//!   contract, exposition is the external admin surface's job. This module
//!   installs a `PrometheusHandle` in-process and hands its rendered text
//!   to whoever calls `MetricsCollector::export`.
//! - Recording helpers are free functions using the `metrics` facade macros
//!   so call sites stay cheap (atomic increments) regardless of which
//!   recorder is installed.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

pub struct MetricsCollector {
    handle: PrometheusHandle,
}

impl MetricsCollector {
    pub fn install() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder");
        Self { handle }
    }

    /// Admin contract: `MetricsCollector::export`.
    pub fn export(&self) -> String {
        self.handle.render()
    }
}

pub fn record_request(method: &str, status: u16, backend: &str, started_at: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("backend", backend.to_string()),
    ];
    counter!("proxy_requests_total", &labels).increment(1);
    histogram!("proxy_request_duration_seconds", &labels).record(started_at.elapsed().as_secs_f64());
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!("proxy_backend_healthy", "backend" => backend.to_string()).set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_circuit_state(backend: &str, state: &str) {
    gauge!("proxy_circuit_breaker_state", "backend" => backend.to_string(), "state" => state.to_string()).set(1.0);
}

pub fn record_rate_limited(key: &str) {
    counter!("proxy_rate_limited_total", "key" => key.to_string()).increment(1);
}
