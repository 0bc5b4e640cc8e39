//! Request representation and per-request metadata.
//!
//! # Responsibilities
//! - Carry the parsed head plus everything derived from it (host, request ID)
//! - Generate a request ID as early as possible, before any policy check
//!
//! # Design Decisions
//! - Request ID is a UUID v4, attached even to requests that never reach a
//!   backend, so every log line and short-circuit response can be correlated
//! - `host()` is derived once and normalized the same way `routing::matcher`
//!   normalizes it, so callers never re-implement the lowercase/strip-port rule

use crate::http::parser::{body_framing, find_header, BodyFraming, RequestHead};
use crate::routing::matcher::normalize_host;
use std::net::SocketAddr;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Request {
    pub head: RequestHead,
    pub request_id: Uuid,
    pub peer_addr: SocketAddr,
}

impl Request {
    pub fn new(head: RequestHead, peer_addr: SocketAddr) -> Self {
        Self {
            head,
            request_id: Uuid::new_v4(),
            peer_addr,
        }
    }

    pub fn host(&self) -> Option<String> {
        find_header(&self.head.headers, "host").map(normalize_host)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.head.headers, name)
    }

    pub fn body_framing(&self) -> BodyFraming {
        body_framing(&self.head.headers)
    }

    pub fn client_ip(&self) -> std::net::IpAddr {
        self.peer_addr.ip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::parser::{find_head_end, parse_request_head};

    fn make_request(raw: &str) -> Request {
        let buf = raw.as_bytes();
        let end = find_head_end(buf).unwrap();
        let head = parse_request_head(buf, end).unwrap();
        Request::new(head, "127.0.0.1:9999".parse().unwrap())
    }

    #[test]
    fn host_is_normalized() {
        let req = make_request("GET / HTTP/1.1\r\nHost: Example.COM:8080\r\n\r\n");
        assert_eq!(req.host().as_deref(), Some("example.com"));
    }

    #[test]
    fn each_request_gets_a_distinct_id() {
        let a = make_request("GET / HTTP/1.1\r\n\r\n");
        let b = make_request("GET / HTTP/1.1\r\n\r\n");
        assert_ne!(a.request_id, b.request_id);
    }
}
