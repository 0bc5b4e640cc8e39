//! IP-hash load balancing strategy.
//!
//! Deterministically maps a client address onto a backend so repeat
//! connections from the same client land on the same backend as long as
//! the candidate set is unchanged. Uses a non-cryptographic hash: this is
//! a distribution function, not a security boundary.

use crate::load_balancer::backend::Backend;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::sync::Arc;

pub fn select(client_ip: IpAddr, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
    if backends.is_empty() {
        return None;
    }
    let mut hasher = DefaultHasher::new();
    client_ip.hash(&mut hasher);
    let index = (hasher.finish() as usize) % backends.len();
    Some(backends[index].clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_client_ip_maps_to_same_backend() {
        let a = Arc::new(Backend::new("http://a".to_string()));
        let b = Arc::new(Backend::new("http://b".to_string()));
        let backends = vec![a.clone(), b.clone()];
        let ip: IpAddr = "10.0.0.7".parse().unwrap();

        let first = select(ip, &backends).unwrap().url.clone();
        let second = select(ip, &backends).unwrap().url.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_candidate_list_yields_none() {
        let ip: IpAddr = "10.0.0.7".parse().unwrap();
        assert!(select(ip, &[]).is_none());
    }
}
