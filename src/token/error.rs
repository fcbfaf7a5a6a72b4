use serde_json::{json, Value};
use thiserror::Error;

use crate::http::error::{HttpError, HttpErrorKind};
use crate::providers::store::StoreError;

/// Failures while obtaining the self token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Client credentials or the token endpoint do not resolve.
    #[error("missing environment variables: {}", .missing.join(", "))]
    Env { missing: Vec<&'static str> },

    /// The identity provider refused or failed the grant.
    #[error("{message}")]
    Grant {
        message: String,
        ctx: Value,
        code: u16,
    },

    #[error("failed to decode token: {0}")]
    Decode(#[from] jsonwebtoken::errors::Error),

    #[error("token persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

impl TokenError {
    pub(crate) fn grant_status(code: u16, ctx: Value) -> Self {
        TokenError::Grant {
            message: format!("Client Credentials Grant Failure with status {}", code),
            ctx,
            code,
        }
    }

    /// Status to report to a caller.
    pub fn code(&self) -> u16 {
        match self {
            TokenError::Grant { code, .. } => *code,
            _ => 500,
        }
    }

    /// The `{error, code, step, ctx}` map.
    pub fn to_json(&self) -> Value {
        let ctx = match self {
            TokenError::Grant { ctx, .. } => ctx.clone(),
            TokenError::Env { missing } => json!({ "missing": missing }),
            _ => Value::Null,
        };
        json!({
            "error": self.to_string(),
            "code": self.code(),
            "step": "self_token",
            "ctx": ctx,
        })
    }
}

impl From<HttpError> for TokenError {
    fn from(err: HttpError) -> Self {
        match err.kind {
            HttpErrorKind::Status => TokenError::grant_status(err.code, err.ctx),
            _ => TokenError::Grant {
                message: err.message,
                ctx: err.ctx,
                code: err.code,
            },
        }
    }
}
