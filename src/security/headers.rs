//! Header manipulation and forwarding headers.
//!
//! # Responsibilities
//! - Add `X-Forwarded-For`, `X-Forwarded-Proto`, `X-Forwarded-Host`
//! - Strip hop-by-hop headers before relaying a request or response
//!
//! # Design Decisions
//! - Always append to an existing `X-Forwarded-For` rather than overwrite,
//!   preserving the chain through any upstream proxies
//! - Never trust inbound `X-Forwarded-*` as the sole source of truth for
//!   the connecting peer; the relay always knows the real socket address
//! - Hop-by-hop headers are stripped per RFC 7230 §6.1, since they describe
//!   this connection, not the one to the backend

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

pub fn strip_hop_by_hop(headers: &mut Vec<(String, String)>) {
    headers.retain(|(name, _)| !is_hop_by_hop(name));
}

pub fn append_forwarded_for(headers: &mut Vec<(String, String)>, client_ip: &str) {
    if let Some((_, value)) = headers
        .iter_mut()
        .find(|(name, _)| name.eq_ignore_ascii_case("x-forwarded-for"))
    {
        value.push_str(", ");
        value.push_str(client_ip);
    } else {
        headers.push(("X-Forwarded-For".to_string(), client_ip.to_string()));
    }
}

pub fn set_forwarded_proto(headers: &mut Vec<(String, String)>, proto: &str) {
    headers.push(("X-Forwarded-Proto".to_string(), proto.to_string()));
}

pub fn set_forwarded_host(headers: &mut Vec<(String, String)>, host: &str) {
    headers.push(("X-Forwarded-Host".to_string(), host.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_hop_by_hop_headers() {
        let mut headers = vec![
            ("Connection".to_string(), "keep-alive".to_string()),
            ("Content-Type".to_string(), "text/plain".to_string()),
        ];
        strip_hop_by_hop(&mut headers);
        assert_eq!(headers, vec![("Content-Type".to_string(), "text/plain".to_string())]);
    }

    #[test]
    fn appends_to_existing_forwarded_for() {
        let mut headers = vec![("X-Forwarded-For".to_string(), "1.1.1.1".to_string())];
        append_forwarded_for(&mut headers, "2.2.2.2");
        assert_eq!(headers[0].1, "1.1.1.1, 2.2.2.2");
    }

    #[test]
    fn creates_forwarded_for_when_absent() {
        let mut headers = vec![];
        append_forwarded_for(&mut headers, "2.2.2.2");
        assert_eq!(headers[0], ("X-Forwarded-For".to_string(), "2.2.2.2".to_string()));
    }
}
