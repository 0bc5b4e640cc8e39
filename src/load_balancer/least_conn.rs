//! Least-connections load balancing strategy.

use crate::load_balancer::backend::Backend;
use std::sync::Arc;

/// Picks the backend with the fewest active connections. Ties resolve to
/// the first candidate in iteration order, which keeps selection stable
/// when all counts are equal (e.g. at startup).
pub fn select(backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
    backends
        .iter()
        .min_by_key(|b| b.active_connections())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_backend_with_fewest_connections() {
        let a = Arc::new(Backend::new("http://a".to_string()));
        let b = Arc::new(Backend::new("http://b".to_string()));
        let _guard = a.acquire();
        let backends = vec![a.clone(), b.clone()];

        assert_eq!(select(&backends).unwrap().url, "http://b");
    }

    #[test]
    fn ties_resolve_to_first_candidate() {
        let a = Arc::new(Backend::new("http://a".to_string()));
        let b = Arc::new(Backend::new("http://b".to_string()));
        let backends = vec![a.clone(), b.clone()];

        assert_eq!(select(&backends).unwrap().url, "http://a");
    }
}
