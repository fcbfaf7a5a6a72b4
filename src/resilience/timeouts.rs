//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound every outbound call with a deadline
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities, independent of the transport
//! - Timeout errors are distinct from other errors and map to 504 upstream

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timed out after {0:?}")]
pub struct TimedOut(pub Duration);

/// Await `fut`, giving up after `limit`.
pub async fn enforce<F: Future>(limit: Duration, fut: F) -> Result<F::Output, TimedOut> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| TimedOut(limit))
}
