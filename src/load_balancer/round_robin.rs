//! Round-robin load balancing strategy.
//!
//! Counters are kept per route key (the matched path prefix or host), not
//! global, so unrelated routes rotate independently of each other.

use crate::load_balancer::backend::Backend;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct RoundRobinBalancer {
    counters: DashMap<String, AtomicUsize>,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, route_key: &str, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }
        let counter = self
            .counters
            .entry(route_key.to_string())
            .or_insert_with(|| AtomicUsize::new(0));
        let index = counter.fetch_add(1, Ordering::Relaxed) % backends.len();
        Some(backends[index].clone())
    }

    /// Reset all counters, invoked on config reload so a shrinking or
    /// reordered backend list doesn't skip entries unpredictably.
    pub fn reset(&self) {
        self.counters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_through_backends_in_order() {
        let lb = RoundRobinBalancer::new();
        let a = Arc::new(Backend::new("http://a".to_string()));
        let b = Arc::new(Backend::new("http://b".to_string()));
        let backends = vec![a.clone(), b.clone()];

        assert_eq!(lb.select("/", &backends).unwrap().url, "http://a");
        assert_eq!(lb.select("/", &backends).unwrap().url, "http://b");
        assert_eq!(lb.select("/", &backends).unwrap().url, "http://a");
    }

    #[test]
    fn counters_are_independent_per_route_key() {
        let lb = RoundRobinBalancer::new();
        let a = Arc::new(Backend::new("http://a".to_string()));
        let b = Arc::new(Backend::new("http://b".to_string()));
        let backends = vec![a.clone(), b.clone()];

        assert_eq!(lb.select("/one", &backends).unwrap().url, "http://a");
        assert_eq!(lb.select("/two", &backends).unwrap().url, "http://a");
    }

    #[test]
    fn reset_restarts_rotation() {
        let lb = RoundRobinBalancer::new();
        let a = Arc::new(Backend::new("http://a".to_string()));
        let b = Arc::new(Backend::new("http://b".to_string()));
        let backends = vec![a.clone(), b.clone()];

        lb.select("/", &backends);
        lb.reset();
        assert_eq!(lb.select("/", &backends).unwrap().url, "http://a");
    }
}
