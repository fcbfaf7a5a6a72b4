//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AuthConfig (validated, immutable)
//!     → handed to TokenManager / KeySetValidator builders at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets may stay out of the file and come from the environment accessor

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::AuthConfig;
pub use schema::CircuitConfig;
pub use schema::HttpConfig;
pub use schema::IdentityConfig;
pub use schema::TokenConfig;
