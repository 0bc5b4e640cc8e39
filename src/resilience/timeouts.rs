//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap connect/request/idle waits with a deadline
//! - Turn an elapsed deadline into a typed error the caller maps to 504
//!
//! # Design Decisions
//! - Built on `tokio::time::timeout`, no custom deadline tracking
//! - A timeout is a distinct outcome from a connection error, so callers
//!   (passive health checks, admin metrics) can tell them apart

use std::future::Future;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("operation timed out after {0:?}")]
pub struct TimedOut(pub Duration);

/// Run `fut` with a deadline of `duration`. Returns `Err(TimedOut)` if the
/// deadline elapses first, otherwise `fut`'s own result.
pub async fn with_timeout<F, T>(duration: Duration, fut: F) -> Result<T, TimedOut>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| TimedOut(duration))
}
