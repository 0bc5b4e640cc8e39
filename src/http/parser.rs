//! Hand-rolled HTTP/1.1 request-line and header parsing.
//!
//! # Responsibilities
//! - Find the `\r\n\r\n` head/body boundary in a growing read buffer
//! - Parse the request line and headers once the boundary is found
//! - Classify the body framing (`Content-Length`, chunked, or none)
//!
//! # Design Decisions
//! - Operates directly on the accumulated byte buffer; no hyper/httparse.
//!   `ConnectionDriver` keeps reading until the full head is present, then
//!   calls this once per request.
//! - Header lookups are case-insensitive. When a header repeats, the
//!   *last* occurrence wins — a deliberate, documented deviation from
//!   strict RFC 7230 (which leaves repeated non-list headers undefined);
//!   this proxy favors the value a client or intermediary appended most
//!   recently.
//! - No percent-decoding or path normalization here: routing matches the
//!   raw request-target, matching the spec's prefix-match semantics.

const MAX_HEAD_LINES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpVersion::Http10 => "HTTP/1.0",
            HttpVersion::Http11 => "HTTP/1.1",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    pub path: String,
    pub query: Option<String>,
    pub version: HttpVersion,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed request line")]
    MalformedRequestLine,
    #[error("unsupported HTTP version")]
    UnsupportedVersion,
    #[error("malformed header line: {0}")]
    MalformedHeader(String),
    #[error("too many header lines")]
    TooManyHeaders,
    #[error("request is not valid UTF-8")]
    InvalidEncoding,
}

/// Body framing as determined by the request/response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    ContentLength(usize),
    Chunked,
    None,
}

/// Scan `buf` for the `\r\n\r\n` terminator. Returns the byte offset of the
/// first byte after the terminator (start of the body) if found.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

/// Parse a complete request head (`buf[..head_end]`, terminator included).
pub fn parse_request_head(buf: &[u8], head_end: usize) -> Result<RequestHead, ParseError> {
    let text = std::str::from_utf8(&buf[..head_end]).map_err(|_| ParseError::InvalidEncoding)?;
    let mut lines = text.split("\r\n");

    let request_line = lines.next().ok_or(ParseError::MalformedRequestLine)?;
    let mut parts = request_line.split(' ');
    let method = parts.next().ok_or(ParseError::MalformedRequestLine)?.to_string();
    let target = parts.next().ok_or(ParseError::MalformedRequestLine)?.to_string();
    let version_str = parts.next().ok_or(ParseError::MalformedRequestLine)?;
    if parts.next().is_some() {
        return Err(ParseError::MalformedRequestLine);
    }
    let version = match version_str {
        "HTTP/1.1" => HttpVersion::Http11,
        "HTTP/1.0" => HttpVersion::Http10,
        _ => return Err(ParseError::UnsupportedVersion),
    };

    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), Some(q.to_string())),
        None => (target.clone(), None),
    };

    let mut headers = Vec::new();
    for (count, line) in lines.enumerate() {
        if line.is_empty() {
            break;
        }
        if count >= MAX_HEAD_LINES {
            return Err(ParseError::TooManyHeaders);
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ParseError::MalformedHeader(line.to_string()))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(RequestHead {
        method,
        target,
        path,
        query,
        version,
        headers,
    })
}

#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub version: HttpVersion,
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
}

/// Parse a complete backend response head, mirroring `parse_request_head`
/// but for a status line instead of a request line.
pub fn parse_response_head(buf: &[u8], head_end: usize) -> Result<ResponseHead, ParseError> {
    let text = std::str::from_utf8(&buf[..head_end]).map_err(|_| ParseError::InvalidEncoding)?;
    let mut lines = text.split("\r\n");

    let status_line = lines.next().ok_or(ParseError::MalformedRequestLine)?;
    let mut parts = status_line.splitn(3, ' ');
    let version_str = parts.next().ok_or(ParseError::MalformedRequestLine)?;
    let status: u16 = parts
        .next()
        .ok_or(ParseError::MalformedRequestLine)?
        .parse()
        .map_err(|_| ParseError::MalformedRequestLine)?;
    let reason = parts.next().unwrap_or("").to_string();

    let version = match version_str {
        "HTTP/1.1" => HttpVersion::Http11,
        "HTTP/1.0" => HttpVersion::Http10,
        _ => return Err(ParseError::UnsupportedVersion),
    };

    let mut headers = Vec::new();
    for (count, line) in lines.enumerate() {
        if line.is_empty() {
            break;
        }
        if count >= MAX_HEAD_LINES {
            return Err(ParseError::TooManyHeaders);
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ParseError::MalformedHeader(line.to_string()))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(ResponseHead {
        version,
        status,
        reason,
        headers,
    })
}

/// Case-insensitive header lookup. Returns the *last* matching value when a
/// header name repeats (see module docs).
pub fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .rev()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Determine how the body is framed from a header list, preferring
/// `Transfer-Encoding: chunked` over `Content-Length` per RFC 7230 §3.3.3.
pub fn body_framing(headers: &[(String, String)]) -> BodyFraming {
    if let Some(te) = find_header(headers, "transfer-encoding") {
        if te.eq_ignore_ascii_case("chunked") {
            return BodyFraming::Chunked;
        }
    }
    if let Some(len) = find_header(headers, "content-length") {
        if let Ok(len) = len.trim().parse::<usize>() {
            return BodyFraming::ContentLength(len);
        }
    }
    BodyFraming::None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(raw: &str) -> RequestHead {
        let buf = raw.as_bytes();
        let end = find_head_end(buf).unwrap();
        parse_request_head(buf, end).unwrap()
    }

    #[test]
    fn finds_head_boundary() {
        let buf = b"GET / HTTP/1.1\r\nHost: a\r\n\r\nbody";
        assert_eq!(find_head_end(buf), Some(buf.len() - 4));
    }

    #[test]
    fn incomplete_head_returns_none() {
        let buf = b"GET / HTTP/1.1\r\nHost: a\r\n";
        assert_eq!(find_head_end(buf), None);
    }

    #[test]
    fn parses_request_line_and_headers() {
        let h = head("GET /api/v1?x=1 HTTP/1.1\r\nHost: example.com\r\nX-A: 1\r\n\r\n");
        assert_eq!(h.method, "GET");
        assert_eq!(h.path, "/api/v1");
        assert_eq!(h.query.as_deref(), Some("x=1"));
        assert_eq!(h.version, HttpVersion::Http11);
        assert_eq!(find_header(&h.headers, "host"), Some("example.com"));
    }

    #[test]
    fn repeated_header_last_write_wins() {
        let h = head("GET / HTTP/1.1\r\nX-A: first\r\nX-A: second\r\n\r\n");
        assert_eq!(find_header(&h.headers, "x-a"), Some("second"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let h = head("GET / HTTP/1.1\r\nHOST: example.com\r\n\r\n");
        assert_eq!(find_header(&h.headers, "host"), Some("example.com"));
    }

    #[test]
    fn parses_response_status_line() {
        let buf = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
        let end = find_head_end(buf).unwrap();
        let response = parse_response_head(buf, end).unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.reason, "Not Found");
        assert_eq!(find_header(&response.headers, "content-length"), Some("0"));
    }

    #[test]
    fn rejects_unsupported_version() {
        let buf = b"GET / HTTP/2.0\r\n\r\n";
        let end = find_head_end(buf).unwrap();
        assert!(matches!(
            parse_request_head(buf, end),
            Err(ParseError::UnsupportedVersion)
        ));
    }

    #[test]
    fn chunked_takes_priority_over_content_length() {
        let h = head("POST / HTTP/1.1\r\nContent-Length: 10\r\nTransfer-Encoding: chunked\r\n\r\n");
        assert_eq!(body_framing(&h.headers), BodyFraming::Chunked);
    }

    #[test]
    fn content_length_framing_is_parsed() {
        let h = head("POST / HTTP/1.1\r\nContent-Length: 42\r\n\r\n");
        assert_eq!(body_framing(&h.headers), BodyFraming::ContentLength(42));
    }

    #[test]
    fn no_framing_header_means_no_body() {
        let h = head("GET / HTTP/1.1\r\n\r\n");
        assert_eq!(body_framing(&h.headers), BodyFraming::None);
    }
}
