//! Inbound token validation against the identity provider's key set.

pub mod error;
pub mod key_set;
pub mod validator;

pub use error::JwksError;
pub use key_set::KeySet;
pub use validator::{KeySetValidator, KeySetValidatorBuilder};
