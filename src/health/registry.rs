//! Shared registry of per-backend health state.

use crate::health::state::BackendHealth;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct HealthRegistry {
    backends: DashMap<String, Arc<BackendHealth>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, url: &str) -> Arc<BackendHealth> {
        if let Some(existing) = self.backends.get(url) {
            return existing.clone();
        }
        self.backends
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(BackendHealth::new(url.to_string())))
            .clone()
    }

    pub fn is_healthy(&self, url: &str) -> bool {
        self.backends.get(url).map(|h| h.is_healthy()).unwrap_or(true)
    }

    /// Snapshot of every tracked backend's health, for the admin surface.
    pub fn snapshot_all(&self) -> Vec<(String, bool)> {
        self.backends
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().is_healthy()))
            .collect()
    }
}
