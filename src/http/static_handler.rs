//! Hook point for `file://` backends.
//!
//! Static file serving itself is an external collaborator: the
//! `ConnectionDriver` only needs to recognize a `file://` backend and hand
//! the request off. This module defines that hand-off contract and a
//! minimal default so the driver has something to call when no external
//! handler is wired in.

use crate::http::response::LocalResponse;

pub trait StaticHandler: Send + Sync {
    fn serve(&self, path: &str, root: &str) -> LocalResponse;
}

/// Default handler used when nothing external is wired in: every request
/// is rejected rather than silently falling through to proxying.
pub struct UnconfiguredStaticHandler;

impl StaticHandler for UnconfiguredStaticHandler {
    fn serve(&self, _path: &str, _root: &str) -> LocalResponse {
        crate::http::response::LocalResponse::new(
            501,
            "Not Implemented",
            "static file serving is not configured on this instance",
        )
    }
}
