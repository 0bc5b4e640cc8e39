//! Admin authentication primitives.
//!
//! Pure functions only: the external admin surface owns the HTTP transport
//! (headers, status codes) and calls into these to decide whether a request
//! is allowed.

use crate::config::schema::AdminAuthConfig;
use std::net::IpAddr;

/// Compare a presented API key against the configured one. An empty
/// configured key always rejects, since that means admin auth was never set up.
pub fn verify_api_key(presented: &str, config: &AdminAuthConfig) -> bool {
    !config.api_key.is_empty() && presented == config.api_key
}

pub fn verify_basic_auth(username: &str, password: &str, config: &AdminAuthConfig) -> bool {
    config.users.get(username).is_some_and(|expected| expected == password)
}

/// An empty whitelist means no IP restriction is configured.
pub fn verify_ip_allowed(addr: IpAddr, config: &AdminAuthConfig) -> bool {
    config.ip_whitelist.is_empty()
        || config
            .ip_whitelist
            .iter()
            .any(|allowed| allowed.parse::<IpAddr>().map(|a| a == addr).unwrap_or(false))
}
