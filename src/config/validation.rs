//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds and timeouts > 0)
//! - Check that configured endpoints are absolute URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AuthConfig → Result<(), Vec<ValidationError>>

use std::fmt;
use url::Url;

use crate::config::schema::AuthConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_url(field: &'static str, value: Option<&str>, errors: &mut Vec<ValidationError>) {
    if let Some(value) = value {
        if let Err(e) = Url::parse(value) {
            errors.push(ValidationError {
                field,
                message: format!("'{}' is not an absolute URL ({})", value, e),
            });
        }
    }
}

fn check_positive(field: &'static str, value: i64, errors: &mut Vec<ValidationError>) {
    if value <= 0 {
        errors.push(ValidationError {
            field,
            message: format!("must be greater than zero, got {}", value),
        });
    }
}

pub fn validate_config(config: &AuthConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url("identity.token_endpoint", config.identity.token_endpoint.as_deref(), &mut errors);
    check_url("identity.jwks_endpoint", config.identity.jwks_endpoint.as_deref(), &mut errors);
    check_url(
        "identity.identity_endpoint",
        config.identity.identity_endpoint.as_deref(),
        &mut errors,
    );

    check_positive("token.window_width_secs", config.token.window_width_secs, &mut errors);
    if config.token.expiry_threshold_secs < 0 {
        errors.push(ValidationError {
            field: "token.expiry_threshold_secs",
            message: "must not be negative".to_string(),
        });
    }

    check_positive(
        "circuit.failure_threshold_secs",
        config.circuit.failure_threshold_secs,
        &mut errors,
    );
    check_positive("circuit.stand_down_secs", config.circuit.stand_down_secs, &mut errors);
    if config.circuit.failure_count_threshold == 0 {
        errors.push(ValidationError {
            field: "circuit.failure_count_threshold",
            message: "must be at least 1".to_string(),
        });
    }
    if config.circuit.max_retries == 0 {
        errors.push(ValidationError {
            field: "circuit.max_retries",
            message: "must allow at least one attempt".to_string(),
        });
    }

    if config.http.timeout_ms == 0 {
        errors.push(ValidationError {
            field: "http.timeout_ms",
            message: "must be greater than zero".to_string(),
        });
    }
    if config.http.base_delay_ms > config.http.max_delay_ms {
        errors.push(ValidationError {
            field: "http.base_delay_ms",
            message: "must not exceed http.max_delay_ms".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
