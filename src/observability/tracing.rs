//! Per-request tracing spans.
//!
//! # Responsibilities
//! - Attach the request ID generated in `http::request` to every log line
//!   emitted while a request is being handled
//!
//! # Design Decisions
//! - Spans, not manual field interpolation, so nested calls (routing,
//!   load balancing, relay) inherit the request ID without threading it
//!   through every function signature
//! - No OpenTelemetry export wired up; W3C Trace Context propagation to
//!   backends is out of scope for this proxy's core

use uuid::Uuid;

pub fn request_span(request_id: Uuid, method: &str, path: &str) -> tracing::Span {
    tracing::info_span!("request", request_id = %request_id, method, path)
}
