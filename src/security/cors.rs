//! CORS policy evaluation.
//!
//! # Responsibilities
//! - Detect CORS preflight requests (`OPTIONS` + `Origin` +
//!   `Access-Control-Request-Method`)
//! - Decide which `Access-Control-*` response headers to emit for a given
//!   origin
//!
//! # Design Decisions
//! - `allow_credentials` and a wildcard origin are mutually exclusive; the
//!   config validator already rejects this combination, so this module can
//!   assume it never sees it
//! - An origin not on the allow-list gets no CORS headers at all rather than
//!   an explicit rejection; the browser enforces the policy client-side

use crate::config::schema::CorsConfig;

pub fn is_preflight(method: &str, origin: Option<&str>, request_method: Option<&str>) -> bool {
    method.eq_ignore_ascii_case("OPTIONS") && origin.is_some() && request_method.is_some()
}

/// Headers to attach to a CORS-eligible response, or `None` if the origin
/// is not allowed.
pub struct CorsHeaders {
    pub allow_origin: String,
    pub allow_credentials: bool,
    pub allow_methods: Option<String>,
    pub allow_headers: Option<String>,
    pub expose_headers: Option<String>,
    pub max_age: Option<String>,
}

pub fn evaluate(config: &CorsConfig, origin: &str, preflight: bool) -> Option<CorsHeaders> {
    if !config.enabled {
        return None;
    }
    let wildcard = config.allowed_origins.iter().any(|o| o == "*");
    let matched = wildcard || config.allowed_origins.iter().any(|o| o == origin);
    if !matched {
        return None;
    }

    let allow_origin = if wildcard && !config.allow_credentials {
        "*".to_string()
    } else {
        origin.to_string()
    };

    Some(CorsHeaders {
        allow_origin,
        allow_credentials: config.allow_credentials,
        allow_methods: preflight.then(|| config.allowed_methods.join(", ")),
        allow_headers: preflight.then(|| config.allowed_headers.join(", ")),
        expose_headers: (!preflight && !config.exposed_headers.is_empty())
            .then(|| config.exposed_headers.join(", ")),
        max_age: preflight.then(|| config.max_age_seconds.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CorsConfig {
        CorsConfig {
            enabled: true,
            allowed_origins: vec!["https://app.example.com".to_string()],
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            allowed_headers: vec!["Content-Type".to_string()],
            exposed_headers: vec![],
            allow_credentials: true,
            max_age_seconds: 600,
        }
    }

    #[test]
    fn detects_preflight() {
        assert!(is_preflight(
            "OPTIONS",
            Some("https://app.example.com"),
            Some("POST")
        ));
        assert!(!is_preflight("GET", Some("https://app.example.com"), None));
        assert!(!is_preflight("OPTIONS", None, Some("POST")));
    }

    #[test]
    fn allowed_origin_gets_headers() {
        let headers = evaluate(&config(), "https://app.example.com", false).unwrap();
        assert_eq!(headers.allow_origin, "https://app.example.com");
        assert!(headers.allow_credentials);
    }

    #[test]
    fn unlisted_origin_gets_no_headers() {
        assert!(evaluate(&config(), "https://evil.example.com", false).is_none());
    }

    #[test]
    fn preflight_includes_methods_and_headers() {
        let headers = evaluate(&config(), "https://app.example.com", true).unwrap();
        assert_eq!(headers.allow_methods.unwrap(), "GET, POST");
        assert_eq!(headers.allow_headers.unwrap(), "Content-Type");
    }

    #[test]
    fn wildcard_without_credentials_echoes_wildcard() {
        let cfg = CorsConfig {
            allow_credentials: false,
            allowed_origins: vec!["*".to_string()],
            ..config()
        };
        let headers = evaluate(&cfg, "https://anything.example", false).unwrap();
        assert_eq!(headers.allow_origin, "*");
    }
}
