//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the identity provider:
//!     → timeouts.rs (enforce the per-call deadline)
//!     → On failure: retries.rs (check if retryable, retry with backoff.rs delays)
//!     → circuit_breaker.rs (judge the final outcome, open circuit if threshold exceeded)
//!
//! Shared deadline (token refresh):
//!     → retry_window.rs (jittered "act now?" decision)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Only 5xx and transport failures are retried; 4xx return immediately
//! - The breaker sees one attempt per guarded call, however many retries it took
//! - All resilience logic is plain higher-order functions over futures

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod retry_window;
pub mod timeouts;

pub use backoff::Backoff;
pub use circuit_breaker::{CircuitBreaker, CircuitOpen, CircuitRecord, CircuitState};
pub use retries::Retryable;
