//! Configuration validation logic.
//!
//! Implements the semantic checks from spec §4.12: route prefixes, backend
//! URL shape, `file://` existence, duplicate backends, and the CORS
//! credentials/wildcard invariant from §4.8.

use crate::config::schema::ServerConfig;
use std::collections::HashSet;
use std::path::Path;
use url::Url;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate a `ServerConfig` for semantic correctness beyond what serde's
/// deserialization already guarantees structurally.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (prefix, backends) in &config.routes {
        validate_prefix(prefix, &mut errors);
        validate_backend_urls(prefix, backends, &mut errors);
    }

    for (host, backends) in &config.domain_routes {
        validate_backend_urls(host, backends, &mut errors);
    }

    if config.health_check.failure_threshold == 0 {
        errors.push(ValidationError(
            "healthCheck.failureThreshold must be > 0".to_string(),
        ));
    }
    if config.health_check.success_threshold == 0 {
        errors.push(ValidationError(
            "healthCheck.successThreshold must be > 0".to_string(),
        ));
    }

    if config.circuit_breaker.half_open_probes == 0 {
        errors.push(ValidationError(
            "circuitBreaker.halfOpenProbes must be > 0".to_string(),
        ));
    }

    if config.cors.allow_credentials && config.cors.allowed_origins.iter().any(|o| o == "*") {
        errors.push(ValidationError(
            "cors.allowCredentials cannot be combined with a wildcard origin".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_prefix(prefix: &str, errors: &mut Vec<ValidationError>) {
    if !prefix.starts_with('/') {
        errors.push(ValidationError(format!(
            "route prefix '{prefix}' must begin with '/'"
        )));
    }
    if prefix.contains("..") {
        errors.push(ValidationError(format!(
            "route prefix '{prefix}' must not contain '..'"
        )));
    }
}

fn validate_backend_urls(key: &str, backends: &[String], errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for raw in backends {
        if !seen.insert(raw.as_str()) {
            errors.push(ValidationError(format!(
                "duplicate backend '{raw}' in route '{key}'"
            )));
        }

        let url = match Url::parse(raw) {
            Ok(u) => u,
            Err(e) => {
                errors.push(ValidationError(format!(
                    "backend '{raw}' in route '{key}' is not a valid URL: {e}"
                )));
                continue;
            }
        };

        match url.scheme() {
            "http" | "https" => {
                if url.host_str().is_none() {
                    errors.push(ValidationError(format!(
                        "backend '{raw}' in route '{key}' is missing a host"
                    )));
                }
            }
            "file" => {
                let path = url.path();
                if !Path::new(path).exists() {
                    errors.push(ValidationError(format!(
                        "backend '{raw}' in route '{key}' points to a path that does not exist: {path}"
                    )));
                }
            }
            other => {
                errors.push(ValidationError(format!(
                    "backend '{raw}' in route '{key}' has unsupported scheme '{other}'"
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::*;

    #[test]
    fn accepts_well_formed_routes() {
        let mut config = ServerConfig::default();
        config
            .routes
            .insert("/api".to_string(), vec!["http://127.0.0.1:8080".to_string()]);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_prefix_without_leading_slash() {
        let mut config = ServerConfig::default();
        config
            .routes
            .insert("api".to_string(), vec!["http://127.0.0.1:8080".to_string()]);
        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("must begin with '/'")));
    }

    #[test]
    fn rejects_dot_dot_prefix() {
        let mut config = ServerConfig::default();
        config
            .routes
            .insert("/../etc".to_string(), vec!["http://127.0.0.1:8080".to_string()]);
        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("must not contain '..'")));
    }

    #[test]
    fn rejects_duplicate_backend_in_one_route() {
        let mut config = ServerConfig::default();
        config.routes.insert(
            "/api".to_string(),
            vec![
                "http://127.0.0.1:8080".to_string(),
                "http://127.0.0.1:8080".to_string(),
            ],
        );
        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("duplicate backend")));
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let mut config = ServerConfig::default();
        config
            .routes
            .insert("/ftp".to_string(), vec!["ftp://127.0.0.1:21".to_string()]);
        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("unsupported scheme")));
    }

    #[test]
    fn rejects_credentials_with_wildcard_origin() {
        let mut config = ServerConfig::default();
        config.cors.allow_credentials = true;
        config.cors.allowed_origins = vec!["*".to_string()];
        let errs = validate_config(&config).unwrap_err();
        assert!(errs.iter().any(|e| e.0.contains("allowCredentials")));
    }
}
