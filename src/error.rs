//! Crate-level error.

use thiserror::Error;

use crate::config::ConfigError;
use crate::fsm::InvalidTransition;
use crate::http::error::HttpError;
use crate::jwks::error::JwksError;
use crate::providers::store::StoreError;
use crate::resilience::circuit_breaker::CircuitOpen;
use crate::token::error::TokenError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpen),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Jwks(#[from] JwksError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, Error>;
