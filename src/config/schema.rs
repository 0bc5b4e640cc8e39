//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from the JSON
//! configuration document (see `loader.rs`). Every field has a default so a
//! minimal document (even `{}`) parses into a usable configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for the reverse proxy. Once parsed and validated this
/// is wrapped in an `Arc` and published as an immutable snapshot; nothing
/// mutates a `ServerConfig` after `ConfigLoader` hands it out.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Path-prefix routing table, longest-prefix-wins.
    pub routes: HashMap<String, Vec<String>>,

    /// Host-based routing table, exact match on (lowercased) `Host` header.
    #[serde(rename = "domainRoutes")]
    pub domain_routes: HashMap<String, Vec<String>>,

    /// Per-backend weights. Carried through for weighted strategies; the
    /// three named load-balancer algorithms do not consume it.
    #[serde(rename = "backendWeights")]
    pub backend_weights: HashMap<String, u32>,

    #[serde(alias = "loadBalancer", alias = "loadBalancerAlgorithm")]
    pub load_balancer_algorithm: LoadBalancerAlgorithm,

    #[serde(rename = "rateLimiter")]
    pub rate_limiter: RateLimiterConfig,

    #[serde(rename = "circuitBreaker")]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(rename = "healthCheck")]
    pub health_check: HealthCheckConfig,

    pub cors: CorsConfig,

    pub admin: AdminConfig,

    pub timeouts: TimeoutConfig,

    pub limits: LimitsConfig,

    #[serde(rename = "autoHttps")]
    pub auto_https: AutoHttpsConfig,

    pub listener: ListenerConfig,

    pub observability: ObservabilityConfig,
}

/// Listener bind configuration (the plaintext listener; the HTTPS listener
/// address comes from `auto_https.https_port`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub bind_address: String,
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancerAlgorithm {
    #[default]
    RoundRobin,
    LeastConnections,
    IpHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimiterStrategy {
    #[default]
    TokenBucket,
    SlidingWindow,
    FixedWindow,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    pub enabled: bool,
    #[serde(rename = "requestsPerSecond")]
    pub requests_per_second: u32,
    #[serde(rename = "burstSize")]
    pub burst_size: u32,
    pub strategy: RateLimiterStrategy,
    /// When true, the bucket key is `client_ip + ":" + path` instead of
    /// just `client_ip`.
    #[serde(rename = "perPath")]
    pub per_path: bool,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 1000,
            burst_size: 2000,
            strategy: RateLimiterStrategy::TokenBucket,
            per_path: false,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    #[serde(rename = "failureThreshold")]
    pub failure_threshold: u32,
    /// How long a circuit stays OPEN before probing, in seconds.
    #[serde(rename = "timeout")]
    pub open_timeout_secs: u64,
    /// How long since the last failure before CLOSED failure counters reset,
    /// in seconds.
    #[serde(rename = "resetTimeout")]
    pub reset_timeout_secs: u64,
    #[serde(rename = "halfOpenProbes")]
    pub half_open_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            failure_threshold: 5,
            open_timeout_secs: 30,
            reset_timeout_secs: 60,
            half_open_probes: 1,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub enabled: bool,
    #[serde(rename = "intervalSeconds")]
    pub interval_secs: u64,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_secs: u64,
    #[serde(rename = "failureThreshold")]
    pub failure_threshold: u32,
    #[serde(rename = "successThreshold")]
    pub success_threshold: u32,
    pub path: String,
    #[serde(rename = "expectedStatusMin")]
    pub expected_status_min: u16,
    #[serde(rename = "expectedStatusMax")]
    pub expected_status_max: u16,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 5,
            failure_threshold: 3,
            success_threshold: 2,
            path: "/".to_string(),
            expected_status_min: 200,
            expected_status_max: 399,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    #[serde(rename = "allowedOrigins")]
    pub allowed_origins: Vec<String>,
    #[serde(rename = "allowedMethods")]
    pub allowed_methods: Vec<String>,
    #[serde(rename = "allowedHeaders")]
    pub allowed_headers: Vec<String>,
    #[serde(rename = "exposedHeaders")]
    pub exposed_headers: Vec<String>,
    #[serde(rename = "allowCredentials")]
    pub allow_credentials: bool,
    #[serde(rename = "maxAge")]
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_origins: Vec::new(),
            allowed_methods: Vec::new(),
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            allow_credentials: false,
            max_age_seconds: 0,
        }
    }
}

/// Admin authentication configuration. The HTTP surface itself is external
/// (spec §6); this only carries the auth inputs the external admin layer
/// consults through `AdminApi`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,
    pub authentication: AdminAuthConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminAuthConfig {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub users: HashMap<String, String>,
    #[serde(rename = "ipWhitelist")]
    pub ip_whitelist: Vec<String>,
}

/// Timeout configuration, all in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connection: u64,
    pub request: u64,
    pub idle: u64,
    #[serde(rename = "keepAlive")]
    pub keep_alive: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connection: 5,
            request: 30,
            idle: 60,
            keep_alive: 75,
        }
    }
}

/// Byte-size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    #[serde(rename = "maxRequestBytes")]
    pub max_request_bytes: usize,
    #[serde(rename = "maxResponseBytes")]
    pub max_response_bytes: usize,
    #[serde(rename = "bufferBytes")]
    pub buffer_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_bytes: 10 * 1024 * 1024,
            max_response_bytes: 100 * 1024 * 1024,
            buffer_bytes: 64 * 1024,
        }
    }
}

/// Auto-HTTPS / ACME configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AutoHttpsConfig {
    pub enabled: bool,
    #[serde(rename = "acmeEmail")]
    pub acme_email: String,
    pub staging: bool,
    #[serde(rename = "certDir")]
    pub cert_dir: String,
    #[serde(rename = "allowedDomains")]
    pub allowed_domains: Vec<String>,
    #[serde(rename = "httpsPort")]
    pub https_port: u16,
    #[serde(rename = "httpToHttpsRedirect")]
    pub http_to_https_redirect: bool,
}

impl Default for AutoHttpsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            acme_email: String::new(),
            staging: true,
            cert_dir: "certs".to_string(),
            allowed_domains: Vec::new(),
            https_port: 8443,
            http_to_https_redirect: false,
        }
    }
}

/// Observability configuration (metrics exposition is driven by the
/// external admin surface; this only toggles whether the core records
/// anything at all).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}
