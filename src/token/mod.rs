//! Self token subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call needs credentials
//!     → manager.rs (cached token, or client-credentials grant)
//!     → id_token.rs (claims, expiry, bearer header)
//!
//! Inbound request
//!     → header.rs (extract bearer token)
//!     → jwks validator (verify)
//! ```

pub mod error;
pub mod header;
pub mod id_token;
pub mod manager;

pub use error::TokenError;
pub use header::parse_bearer_token;
pub use id_token::{Audience, Claims, IdToken};
pub use manager::{TokenManager, TokenManagerBuilder, TokenSource};
