//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Read the current `ServerConfig` snapshot
//! - Resolve `(host, path)` to an ordered list of candidate backend URLs
//! - Force an out-of-band reload for the admin surface
//!
//! # Design Decisions
//! - Immutable snapshot read (`ArcSwap`), thread-safe without locks
//! - O(1) host lookup via `HashMap`, O(n) path-prefix scan (§4.3)
//! - Explicit `None` rather than a silent default route

use crate::config::loader::load_config;
use crate::config::schema::ServerConfig;
use crate::routing::matcher::{longest_prefix_match, normalize_host};
use arc_swap::ArcSwap;
use std::path::PathBuf;
use std::sync::Arc;

/// The config snapshot shared, read-only, across every subsystem that
/// consults routing/rate-limit/circuit-breaker/health-check settings.
pub type SharedConfig = Arc<ArcSwap<ServerConfig>>;

pub fn shared_config(initial: ServerConfig) -> SharedConfig {
    Arc::new(ArcSwap::from_pointee(initial))
}

/// Route lookup over the live configuration snapshot.
pub struct Router {
    config: SharedConfig,
    config_path: PathBuf,
}

impl Router {
    pub fn new(config: SharedConfig, config_path: PathBuf) -> Self {
        Self { config, config_path }
    }

    /// The currently published snapshot.
    pub fn current(&self) -> Arc<ServerConfig> {
        self.config.load_full()
    }

    /// Resolve `(host, path)` to the ordered backend URL list for that
    /// route, per spec §4.3: host-exact match first, then longest path
    /// prefix. Returns `None` when neither matches.
    pub fn resolve(&self, host: Option<&str>, path: &str) -> Option<Vec<String>> {
        let config = self.config.load();

        if let Some(host) = host {
            let key = normalize_host(host);
            if let Some(backends) = config.domain_routes.get(&key) {
                return Some(backends.clone());
            }
        }

        longest_prefix_match(&config.routes, path).map(|(_, backends)| backends.clone())
    }

    /// Force an immediate reload from disk, bypassing the watcher's 1-second
    /// poll. This is the `Router::reload_config` operation the external
    /// admin surface invokes (spec §6).
    pub fn reload_config(&self) -> Result<(), crate::config::loader::ConfigError> {
        let new_config = load_config(&self.config_path)?;
        self.config.store(Arc::new(new_config));
        tracing::info!("configuration reloaded via admin request");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_routes() -> ServerConfig {
        let mut config = ServerConfig::default();
        config
            .routes
            .insert("/".to_string(), vec!["http://A".to_string()]);
        config
            .routes
            .insert("/api/v1".to_string(), vec!["http://B".to_string()]);
        config
            .domain_routes
            .insert("api.example.com".to_string(), vec!["http://C".to_string()]);
        config
    }

    #[test]
    fn host_route_wins_over_path_route() {
        let router = Router::new(shared_config(config_with_routes()), PathBuf::from("routes.json"));
        let result = router.resolve(Some("API.EXAMPLE.COM:443"), "/api/v1/x");
        assert_eq!(result, Some(vec!["http://C".to_string()]));
    }

    #[test]
    fn longest_prefix_wins_without_host_match() {
        let router = Router::new(shared_config(config_with_routes()), PathBuf::from("routes.json"));
        assert_eq!(
            router.resolve(None, "/api/v1/x"),
            Some(vec!["http://B".to_string()])
        );
        assert_eq!(router.resolve(None, "/api/v2/x"), Some(vec!["http://A".to_string()]));
    }

    #[test]
    fn no_match_returns_none() {
        let mut config = ServerConfig::default();
        config
            .routes
            .insert("/api".to_string(), vec!["http://A".to_string()]);
        let router = Router::new(shared_config(config), PathBuf::from("routes.json"));
        assert_eq!(router.resolve(None, "/other"), None);
    }

    #[test]
    fn resolve_is_deterministic_across_repeated_calls() {
        let router = Router::new(shared_config(config_with_routes()), PathBuf::from("routes.json"));
        let first = router.resolve(None, "/api/v1/x");
        let second = router.resolve(None, "/api/v1/x");
        assert_eq!(first, second);
    }
}
