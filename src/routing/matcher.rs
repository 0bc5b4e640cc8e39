//! Route matching primitives.
//!
//! # Responsibilities
//! - Normalize a `Host` header for exact-match lookup
//! - Find the longest registered path prefix containing a given path
//!
//! # Design Decisions
//! - Host matching is case-insensitive and strips a trailing `:port`
//! - Path matching is case-sensitive, O(n) over registered prefixes
//! - No regex: routes are plain string prefixes, matched by `starts_with`

use std::collections::HashMap;

/// Lowercase a `Host` header value and strip a trailing `:port`, per §4.3.
pub fn normalize_host(host: &str) -> String {
    let without_port = host.split(':').next().unwrap_or(host);
    without_port.to_ascii_lowercase()
}

/// Among all prefixes in `routes` that `path` starts with, return the one
/// with the greatest length (ties are not expected: keys are unique).
pub fn longest_prefix_match<'a, V>(
    routes: &'a HashMap<String, V>,
    path: &str,
) -> Option<(&'a str, &'a V)> {
    routes
        .iter()
        .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(prefix, value)| (prefix.as_str(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_strips_port() {
        assert_eq!(normalize_host("Example.COM:8443"), "example.com");
        assert_eq!(normalize_host("example.com"), "example.com");
    }

    #[test]
    fn picks_longest_matching_prefix() {
        let mut routes = HashMap::new();
        routes.insert("/".to_string(), "root");
        routes.insert("/api/v1".to_string(), "v1");

        let (prefix, value) = longest_prefix_match(&routes, "/api/v1/x").unwrap();
        assert_eq!(prefix, "/api/v1");
        assert_eq!(*value, "v1");

        let (prefix, value) = longest_prefix_match(&routes, "/api/v2/x").unwrap();
        assert_eq!(prefix, "/");
        assert_eq!(*value, "root");
    }

    #[test]
    fn no_match_when_no_prefix_fits() {
        let routes: HashMap<String, &str> = HashMap::new();
        assert!(longest_prefix_match(&routes, "/anything").is_none());
    }
}
