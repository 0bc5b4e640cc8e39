//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → driver.rs (ConnectionDriver: head accumulation, policy chain, relay)
//!     → parser.rs (request-line + header parse, body framing)
//!     → [routing layer decides backend]
//!     → [load balancer picks server]
//!     → relay.rs (byte-for-byte forwarding, both directions)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - HTTP/1.1 only, hand-rolled: no hyper/axum in the request path. The
//!   proxy needs byte-exact control over chunked/Content-Length framing to
//!   relay bodies without re-encoding them.
//! - Request size limits enforced before full parse
//! - Request ID generated for every request (correlation), even ones that
//!   never reach a backend

pub mod driver;
pub mod parser;
pub mod relay;
pub mod request;
pub mod response;
pub mod static_handler;
