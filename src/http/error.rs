//! Errors raised by the resilient invocation layer.

use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::http::response::HttpResponse;
use crate::resilience::circuit_breaker::CircuitOpen;
use crate::resilience::retries::Retryable;

/// What went wrong, beyond the status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpErrorKind {
    /// The provider answered with a failure status.
    Status,
    /// The request never produced a response.
    Transport,
    /// The per-call deadline elapsed.
    Timeout,
    /// The circuit refused the call.
    CircuitOpen(CircuitOpen),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{step}: {message} (status {code})")]
pub struct HttpError {
    pub message: String,
    /// Step that issued the call.
    pub step: String,
    /// HTTP status, or the status this failure is reported as.
    pub code: u16,
    /// Response body or other context.
    pub ctx: Value,
    pub retryable: bool,
    pub kind: HttpErrorKind,
}

impl HttpError {
    fn new(kind: HttpErrorKind, step: &str, message: String, code: u16, ctx: Value) -> Self {
        Self {
            message,
            step: step.to_string(),
            code,
            ctx,
            retryable: code >= 500 && !matches!(kind, HttpErrorKind::CircuitOpen(_)),
            kind,
        }
    }

    /// A response with a failure status.
    pub fn from_response(step: &str, response: HttpResponse) -> Self {
        Self::new(
            HttpErrorKind::Status,
            step,
            format!("request failed with status {}", response.status),
            response.status,
            response.body,
        )
    }

    /// A connection, TLS, or protocol failure. Reported as 503.
    pub fn transport(step: &str, message: impl Into<String>) -> Self {
        Self::new(HttpErrorKind::Transport, step, message.into(), 503, Value::Null)
    }

    /// The deadline elapsed. Reported as 504.
    pub fn timeout(step: &str, limit: Duration) -> Self {
        Self::new(
            HttpErrorKind::Timeout,
            step,
            format!("timed out after {:?}", limit),
            504,
            Value::Null,
        )
    }

    pub fn circuit_open(&self) -> Option<&CircuitOpen> {
        match &self.kind {
            HttpErrorKind::CircuitOpen(open) => Some(open),
            _ => None,
        }
    }

    /// The `{error, code, step, ctx}` map callers surface to their clients.
    pub fn to_json(&self) -> Value {
        json!({
            "error": self.message,
            "code": self.code,
            "step": self.step,
            "ctx": self.ctx,
        })
    }
}

impl Retryable for HttpError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<CircuitOpen> for HttpError {
    fn from(open: CircuitOpen) -> Self {
        let ctx = json!({"state": open.state.as_str(), "failures": open.failures});
        Self::new(
            HttpErrorKind::CircuitOpen(open),
            "circuit_breaker",
            "Circuit Open".to_string(),
            500,
            ctx,
        )
    }
}
