//! Request and connection limits.
//!
//! # Responsibilities
//! - Enforce maximum request body size
//! - Enforce maximum buffered-header size before a request is rejected
//!
//! # Design Decisions
//! - Checked by the parser before a request is handed to routing, so an
//!   oversized request never reaches a backend
//! - Returns a typed error the caller maps to 413 Payload Too Large or
//!   431 Request Header Fields Too Large

use crate::config::schema::LimitsConfig;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LimitError {
    #[error("request body of {0} bytes exceeds the configured limit")]
    BodyTooLarge(usize),
    #[error("request headers of {0} bytes exceed the configured buffer")]
    HeadersTooLarge(usize),
}

pub fn check_body_size(content_length: usize, limits: &LimitsConfig) -> Result<(), LimitError> {
    if content_length > limits.max_request_bytes {
        return Err(LimitError::BodyTooLarge(content_length));
    }
    Ok(())
}

pub fn check_header_buffer(buffered: usize, limits: &LimitsConfig) -> Result<(), LimitError> {
    if buffered > limits.buffer_bytes {
        return Err(LimitError::HeadersTooLarge(buffered));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> LimitsConfig {
        LimitsConfig {
            max_request_bytes: 100,
            max_response_bytes: 1000,
            buffer_bytes: 50,
        }
    }

    #[test]
    fn accepts_body_within_limit() {
        assert!(check_body_size(100, &limits()).is_ok());
    }

    #[test]
    fn rejects_oversized_body() {
        assert_eq!(check_body_size(101, &limits()), Err(LimitError::BodyTooLarge(101)));
    }

    #[test]
    fn rejects_oversized_header_buffer() {
        assert_eq!(
            check_header_buffer(51, &limits()),
            Err(LimitError::HeadersTooLarge(51))
        );
    }
}
