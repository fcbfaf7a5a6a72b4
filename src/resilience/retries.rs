//! Retry logic.
//!
//! # Responsibilities
//! - Re-run a fallible call while its failure is classified retryable
//! - Bound the number of attempts
//! - Sleep with exponential backoff + jitter between attempts
//!
//! # Design Decisions
//! - Classification belongs to the error type (`Retryable`), not the loop
//! - Non-retryable failures return immediately
//! - The last failure is returned as-is once attempts are exhausted

use std::future::Future;

use crate::observability::metrics;
use crate::resilience::backoff::Backoff;

/// Errors that know whether trying again could help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Run `call` up to `max_attempts` times in total.
pub async fn retry<T, E, F, Fut>(
    max_attempts: u32,
    backoff: Backoff,
    step: &str,
    mut call: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = backoff.delay(attempt);
                tracing::info!(step, attempt, delay = ?delay, error = %e, "Retrying call");
                metrics::record_retry(step);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
