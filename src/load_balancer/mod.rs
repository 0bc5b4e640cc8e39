//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Router resolves (host, path) → candidate backend URLs
//!     → filter by HealthChecker (fall back to the full candidate list,
//!       degraded, if every candidate is currently unhealthy)
//!     → dispatch on configured algorithm:
//!         - round_robin.rs (per-route-key rotation)
//!         - least_conn.rs  (fewest active connections)
//!         - ip_hash.rs     (stable hash of client address)
//!     → BackendConnectionGuard (active-connection tracking, released on drop)
//!     → caller applies CircuitBreaker::allow_request to the chosen backend
//! ```
//!
//! # Design Decisions
//! - Three named algorithms are a closed set; dispatched by `match` on
//!   `LoadBalancerAlgorithm` rather than a `dyn` trait object, since the hot
//!   path never needs to add a fourth strategy without a code change anyway.
//! - Health filtering degrades rather than fails: an all-unhealthy candidate
//!   set still gets a pick from the full list, since "unhealthy" is this
//!   proxy's own advisory signal, not a hard guarantee the backend is down.
//!   The circuit breaker is the one gate allowed to fail a request outright,
//!   and it runs after selection, against the one backend actually chosen.

pub mod backend;
pub mod ip_hash;
pub mod least_conn;
pub mod pool;
pub mod round_robin;

use crate::config::schema::LoadBalancerAlgorithm;
use backend::BackendConnectionGuard;
use pool::BackendRegistry;
use round_robin::RoundRobinBalancer;
use std::net::IpAddr;

/// Selects a backend among eligible candidates for a matched route.
#[derive(Debug, Default)]
pub struct LoadBalancer {
    registry: BackendRegistry,
    round_robin: RoundRobinBalancer,
}

impl LoadBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a backend for `route_key` among `candidate_urls`, preferring
    /// those for which `is_healthy` returns true. If none are currently
    /// healthy, falls back to the full candidate list in degraded mode
    /// rather than failing the request outright — the circuit breaker,
    /// not the health filter, is what's allowed to reject a request.
    /// Returns a connection guard whose drop releases the active-connection
    /// slot, or `None` only when `candidate_urls` itself is empty.
    pub fn select(
        &self,
        route_key: &str,
        algorithm: LoadBalancerAlgorithm,
        candidate_urls: &[String],
        client_ip: IpAddr,
        is_healthy: impl Fn(&str) -> bool,
    ) -> Option<BackendConnectionGuard> {
        let healthy_urls: Vec<String> = candidate_urls.iter().filter(|u| is_healthy(u)).cloned().collect();
        let pool = if healthy_urls.is_empty() {
            if !candidate_urls.is_empty() {
                tracing::warn!(route = route_key, "no healthy backends, falling back to full candidate list");
            }
            candidate_urls.to_vec()
        } else {
            healthy_urls
        };
        if pool.is_empty() {
            return None;
        }
        let backends = self.registry.resolve_all(&pool);

        let chosen = match algorithm {
            LoadBalancerAlgorithm::RoundRobin => self.round_robin.select(route_key, &backends),
            LoadBalancerAlgorithm::LeastConnections => least_conn::select(&backends),
            LoadBalancerAlgorithm::IpHash => ip_hash::select(client_ip, &backends),
        }?;

        Some(chosen.acquire())
    }

    /// Reset algorithm-local state on config reload (round-robin counters).
    pub fn reload(&self) {
        self.round_robin.reset();
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip() -> IpAddr {
        "127.0.0.1".parse().unwrap()
    }

    #[test]
    fn unhealthy_candidates_are_excluded_when_some_are_healthy() {
        let lb = LoadBalancer::new();
        let urls = vec!["http://a".to_string(), "http://b".to_string()];
        let picked = lb.select("/", LoadBalancerAlgorithm::RoundRobin, &urls, ip(), |u| u == "http://b");
        assert_eq!(picked.unwrap().url, "http://b");
    }

    #[test]
    fn all_unhealthy_falls_back_to_the_full_candidate_list() {
        let lb = LoadBalancer::new();
        let urls = vec!["http://a".to_string()];
        let picked = lb.select("/", LoadBalancerAlgorithm::RoundRobin, &urls, ip(), |_| false);
        assert_eq!(picked.unwrap().url, "http://a");
    }

    #[test]
    fn empty_candidate_list_yields_none() {
        let lb = LoadBalancer::new();
        let urls: Vec<String> = Vec::new();
        let picked = lb.select("/", LoadBalancerAlgorithm::RoundRobin, &urls, ip(), |_| true);
        assert!(picked.is_none());
    }

    #[test]
    fn round_robin_rotates_across_calls() {
        let lb = LoadBalancer::new();
        let urls = vec!["http://a".to_string(), "http://b".to_string()];
        let first = lb
            .select("/", LoadBalancerAlgorithm::RoundRobin, &urls, ip(), |_| true)
            .unwrap()
            .url
            .clone();
        let second = lb
            .select("/", LoadBalancerAlgorithm::RoundRobin, &urls, ip(), |_| true)
            .unwrap()
            .url
            .clone();
        assert_ne!(first, second);
    }
}
