//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend, identified by its configured URL
//! - Track active connections (for least-connections selection)

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A single backend server, identified by the URL string it was configured
/// with (scheme + host + port). Connection counts are tracked per backend
/// for the duration of each proxied connection.
#[derive(Debug)]
pub struct Backend {
    pub url: String,
    active_connections: AtomicUsize,
}

impl Backend {
    pub fn new(url: String) -> Self {
        Self {
            url,
            active_connections: AtomicUsize::new(0),
        }
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Acquire a guard that increments the connection count and decrements
    /// it on drop, regardless of how the proxied connection ends.
    pub fn acquire(self: &Arc<Self>) -> BackendConnectionGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        BackendConnectionGuard {
            backend: self.clone(),
        }
    }
}

/// RAII guard releasing a backend's connection slot on drop.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    backend: Arc<Backend>,
}

impl Deref for BackendConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        self.backend.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_increments_and_decrements_on_drop() {
        let backend = Arc::new(Backend::new("http://127.0.0.1:9000".to_string()));
        assert_eq!(backend.active_connections(), 0);
        {
            let _guard = backend.acquire();
            assert_eq!(backend.active_connections(), 1);
        }
        assert_eq!(backend.active_connections(), 0);
    }
}
