//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe each backend's configured health path
//! - Report success/failure into the shared `BackendHealth` state
//!
//! # Design Decisions
//! - Uses a dedicated `reqwest::Client` (not the proxy's raw relay path)
//! - Timeout per health check, distinct from the request timeout
//! - Jittered start prevents every backend being probed in lockstep
//! - Runs as a background task, never blocks the request path

use crate::config::schema::HealthCheckConfig;
use crate::health::registry::HealthRegistry;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

pub struct ActiveHealthChecker {
    client: reqwest::Client,
    registry: Arc<HealthRegistry>,
}

impl ActiveHealthChecker {
    pub fn new(registry: Arc<HealthRegistry>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("health check client builds with static config");
        Self { client, registry }
    }

    /// Spawn the probe loop for a single backend URL. One task per backend;
    /// backends are added dynamically as the routing table references them.
    pub fn spawn(self: Arc<Self>, backend_url: String, config: HealthCheckConfig) {
        tokio::spawn(async move {
            if !config.enabled {
                return;
            }
            let initial_jitter = rand::thread_rng().gen_range(0..config.interval_secs.max(1));
            tokio::time::sleep(Duration::from_secs(initial_jitter)).await;

            let probe_url = join_health_path(&backend_url, &config.path);
            let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));

            loop {
                interval.tick().await;
                self.probe_once(&backend_url, &probe_url, &config).await;
            }
        });
    }

    async fn probe_once(&self, backend_url: &str, probe_url: &str, config: &HealthCheckConfig) {
        let health = self.registry.get_or_create(backend_url);
        let outcome = self.client.get(probe_url).send().await;

        let success = match outcome {
            Ok(response) => {
                let status = response.status().as_u16();
                status >= config.expected_status_min && status <= config.expected_status_max
            }
            Err(_) => false,
        };

        if success {
            health.record_success(config.success_threshold);
        } else {
            health.record_failure(config.failure_threshold);
        }
    }
}

fn join_health_path(backend_url: &str, path: &str) -> String {
    format!("{}{}", backend_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_backend_url_and_health_path() {
        assert_eq!(join_health_path("http://a:8080", "/healthz"), "http://a:8080/healthz");
        assert_eq!(join_health_path("http://a:8080/", "/healthz"), "http://a:8080/healthz");
    }
}
