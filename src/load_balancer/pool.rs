//! Backend registry.
//!
//! # Responsibilities
//! - Map a backend URL to its long-lived `Backend` (connection counters
//!   must persist across requests, not be recreated per call)

use crate::load_balancer::backend::Backend;
use dashmap::DashMap;
use std::sync::Arc;

/// Lazily-populated map of backend URL -> `Backend`. Entries are created on
/// first reference and never removed; the set of backend URLs referenced by
/// a config snapshot is small and bounded by the routing table.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    backends: DashMap<String, Arc<Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, url: &str) -> Arc<Backend> {
        if let Some(existing) = self.backends.get(url) {
            return existing.clone();
        }
        self.backends
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(Backend::new(url.to_string())))
            .clone()
    }

    pub fn resolve_all(&self, urls: &[String]) -> Vec<Arc<Backend>> {
        urls.iter().map(|u| self.get_or_create(u)).collect()
    }

    /// Every backend ever referenced, for admin snapshots and health sweeps.
    pub fn all(&self) -> Vec<Arc<Backend>> {
        self.backends.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_returns_the_same_backend_for_repeated_urls() {
        let registry = BackendRegistry::new();
        let first = registry.get_or_create("http://a");
        let second = registry.get_or_create("http://a");
        assert!(Arc::ptr_eq(&first, &second));
    }
}
