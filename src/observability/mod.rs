//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Token manager, key set validator, circuit breaker, retries produce:
//!     → tracing events (structured fields, no secrets)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → logging.rs subscriber (token-cli), or the host application's own
//!     → whatever metrics recorder the host installs
//! ```
//!
//! # Design Decisions
//! - Tokens and client secrets are never logged, only claims such as `exp`
//! - Metrics are cheap (atomic increments) and no-ops without a recorder

pub mod logging;
pub mod metrics;
