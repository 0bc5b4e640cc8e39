//! Locally-generated responses.
//!
//! # Responsibilities
//! - Serialize a status line + headers + body the proxy generates itself
//!   (rate limit, no route, circuit open, admin-rejected, CORS preflight)
//!
//! # Design Decisions
//! - Backend responses are never buffered through this type; they stream
//!   through `relay.rs` byte-for-byte. This is only for responses the
//!   proxy itself originates.
//! - Always sets `Content-Length` and `Connection: close` on error
//!   responses so a client with a broken pipe can't hang the handler

pub struct LocalResponse {
    pub status: u16,
    pub reason: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl LocalResponse {
    pub fn new(status: u16, reason: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            reason,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.body.len());
        out.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", self.status, self.reason).as_bytes());
        out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        out.extend_from_slice(b"Connection: close\r\n\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

pub fn too_many_requests(retry_after_secs: u64) -> LocalResponse {
    LocalResponse::new(429, "Too Many Requests", "rate limit exceeded")
        .with_header("Retry-After", retry_after_secs.to_string())
}

pub fn not_found() -> LocalResponse {
    LocalResponse::new(404, "Not Found", "no route matches this request")
}

pub fn bad_gateway() -> LocalResponse {
    LocalResponse::new(502, "Bad Gateway", "upstream backend is unavailable")
}

pub fn gateway_timeout() -> LocalResponse {
    LocalResponse::new(504, "Gateway Timeout", "upstream backend did not respond in time")
}

pub fn service_unavailable() -> LocalResponse {
    LocalResponse::new(503, "Service Unavailable", "circuit breaker is open for this backend")
}

pub fn forbidden() -> LocalResponse {
    LocalResponse::new(403, "Forbidden", "request rejected")
}

pub fn bad_request(reason: &str) -> LocalResponse {
    LocalResponse::new(400, "Bad Request", reason.to_string())
}

pub fn no_content() -> LocalResponse {
    LocalResponse::new(204, "No Content", Vec::new())
}

pub fn payload_too_large() -> LocalResponse {
    LocalResponse::new(413, "Payload Too Large", "request body exceeds the configured limit")
}

pub fn moved_permanently(location: String) -> LocalResponse {
    LocalResponse::new(301, "Moved Permanently", "redirecting to HTTPS").with_header("Location", location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_status_line_and_body() {
        let raw = too_many_requests(5).serialize();
        let text = String::from_utf8(raw).unwrap();
        assert!(text.starts_with("HTTP/1.1 429 Too Many Requests\r\n"));
        assert!(text.contains("Retry-After: 5\r\n"));
        assert!(text.ends_with("rate limit exceeded"));
    }

    #[test]
    fn content_length_matches_body_len() {
        let response = not_found();
        let expected = format!("Content-Length: {}\r\n", response.body.len());
        let text = String::from_utf8(response.serialize()).unwrap();
        assert!(text.contains(&expected));
    }

    #[test]
    fn moved_permanently_carries_location() {
        let raw = moved_permanently("https://example.com/path".to_string()).serialize();
        let text = String::from_utf8(raw).unwrap();
        assert!(text.starts_with("HTTP/1.1 301 Moved Permanently\r\n"));
        assert!(text.contains("Location: https://example.com/path\r\n"));
    }
}
