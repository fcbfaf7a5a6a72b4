//! Self token core.
//!
//! Obtains, caches and refreshes this service's own OAuth2 client-credentials
//! token, validates inbound bearer tokens against the identity provider's
//! key set, and guards every identity-provider call with a circuit breaker
//! and bounded, jittered retries.
//!
//! # Architecture Overview
//!
//! ```text
//!   token::manager ──────┐            ┌────── jwks::validator
//!      │  refresh?       │            │          │
//!      ▼                 ▼            ▼          ▼
//!   resilience::      http::client (ResilientClient)     cache::LazyCache
//!   retry_window         │
//!                        ├─ resilience::circuit_breaker ── fsm
//!                        ├─ resilience::retries + backoff
//!                        └─ resilience::timeouts
//!
//!   providers: persistence, environment, circuit state
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod jwks;
pub mod token;

// Building blocks
pub mod cache;
pub mod clock;
pub mod fsm;
pub mod providers;

// Cross-cutting concerns
pub mod error;
pub mod observability;
pub mod resilience;

pub use config::schema::AuthConfig;
pub use error::{Error, Result};
pub use jwks::{JwksError, KeySetValidator};
pub use token::{IdToken, TokenError, TokenManager};
