//! Shared application state.
//!
//! One `AppState` is constructed at startup and an `Arc` clone handed to
//! every connection task. It bundles the config snapshot together with
//! every subsystem registry a `ConnectionDriver` needs to serve a request,
//! and is also what the external admin surface holds to drive the
//! `AdminApi` contract (`Router::reload_config`, `CircuitBreaker::reset`,
//! etc).

use crate::acme::ChallengeStore;
use crate::cert::CertificateManager;
use crate::health::HealthChecker;
use crate::http::static_handler::{StaticHandler, UnconfiguredStaticHandler};
use crate::load_balancer::LoadBalancer;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::routing::router::SharedConfig;
use crate::routing::Router;
use crate::security::rate_limit::RateLimiter;
use std::sync::Arc;
use std::time::Duration;

pub struct AppState {
    pub router: Router,
    pub load_balancer: LoadBalancer,
    pub health: HealthChecker,
    pub circuit_breaker: CircuitBreaker,
    pub rate_limiter: Arc<RateLimiter>,
    pub challenges: ChallengeStore,
    pub certificates: Option<Arc<CertificateManager>>,
    pub static_handler: Arc<dyn StaticHandler>,
}

impl AppState {
    pub fn new(config: SharedConfig, config_path: std::path::PathBuf, health_check_timeout: Duration) -> Self {
        Self {
            router: Router::new(config, config_path),
            load_balancer: LoadBalancer::new(),
            health: HealthChecker::new(health_check_timeout),
            circuit_breaker: CircuitBreaker::new(),
            rate_limiter: Arc::new(RateLimiter::new()),
            challenges: ChallengeStore::new(),
            certificates: None,
            static_handler: Arc::new(UnconfiguredStaticHandler),
        }
    }

    /// Wire in an external static file handler, replacing the default
    /// 501-returning stub.
    pub fn with_static_handler(mut self, handler: Arc<dyn StaticHandler>) -> Self {
        self.static_handler = handler;
        self
    }
}
