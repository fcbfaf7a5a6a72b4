use jsonwebtoken::errors::ErrorKind;
use serde_json::{json, Value};
use thiserror::Error;

use crate::http::error::HttpError;

/// Failures while validating an inbound token.
#[derive(Debug, Error)]
pub enum JwksError {
    /// The key set could not be obtained.
    #[error("{message}")]
    Get {
        message: String,
        code: u16,
        ctx: Value,
    },

    /// The token did not decode or verify. The message starts with the
    /// claim or header field that failed.
    #[error("JWT decoding failed: {0}")]
    Decoding(String),
}

impl JwksError {
    pub(crate) fn decoding(message: impl Into<String>) -> Self {
        JwksError::Decoding(message.into())
    }

    pub(crate) fn get(message: impl Into<String>, code: u16, ctx: Value) -> Self {
        JwksError::Get {
            message: message.into(),
            code,
            ctx,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            JwksError::Get { code, .. } => *code,
            JwksError::Decoding(_) => 401,
        }
    }

    /// The `{error, code, step, ctx}` map.
    pub fn to_json(&self) -> Value {
        let ctx = match self {
            JwksError::Get { ctx, .. } => ctx.clone(),
            JwksError::Decoding(_) => Value::Null,
        };
        json!({
            "error": self.to_string(),
            "code": self.code(),
            "step": "jwks_validation",
            "ctx": ctx,
        })
    }
}

impl From<HttpError> for JwksError {
    fn from(err: HttpError) -> Self {
        JwksError::get(
            format!("Failed to get JWKS: {}", err.message),
            err.code,
            err.ctx,
        )
    }
}

impl From<jsonwebtoken::errors::Error> for JwksError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        let message = match err.kind() {
            ErrorKind::InvalidIssuer => "iss: unexpected issuer".to_string(),
            ErrorKind::InvalidAudience => "aud: unexpected audience".to_string(),
            ErrorKind::ExpiredSignature => "exp: token expired".to_string(),
            ErrorKind::ImmatureSignature => "nbf: token not yet valid".to_string(),
            ErrorKind::MissingRequiredClaim(claim) => format!("{}: missing required claim", claim),
            ErrorKind::InvalidSignature => "signature: verification failed".to_string(),
            ErrorKind::InvalidAlgorithm => "alg: algorithm does not match key".to_string(),
            _ => err.to_string(),
        };
        JwksError::Decoding(message)
    }
}
