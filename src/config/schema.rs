//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the token core.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Identity provider endpoints and client credentials.
    pub identity: IdentityConfig,

    /// Self token refresh window.
    pub token: TokenConfig,

    /// Circuit breaker thresholds.
    pub circuit: CircuitConfig,

    /// Outbound HTTP settings.
    pub http: HttpConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Identity provider settings.
///
/// Client credentials left empty here are read from the environment accessor.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    /// OAuth2 client id.
    pub client_id: Option<String>,

    /// OAuth2 client secret.
    pub client_secret: Option<String>,

    /// Token endpoint receiving the client-credentials grant.
    pub token_endpoint: Option<String>,

    /// JWKS document URL. Derived from `identity_endpoint` when unset.
    pub jwks_endpoint: Option<String>,

    /// Base identity URL, used to derive `/.well-known/jwks.json`.
    pub identity_endpoint: Option<String>,

    /// Expected `iss` claim on inbound tokens.
    pub issuer: String,

    /// Audience requested in the grant and, when set, asserted on inbound tokens.
    pub audience: Option<String>,
}

impl IdentityConfig {
    /// The JWKS URL, explicit or derived.
    pub fn jwks_url(&self) -> Option<String> {
        self.jwks_endpoint.clone().or_else(|| {
            self.identity_endpoint
                .as_ref()
                .map(|base| format!("{}/.well-known/jwks.json", base.trim_end_matches('/')))
        })
    }
}

/// Pre-emptive refresh window for the self token.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Width of the jittered window preceding the refresh deadline.
    pub window_width_secs: i64,

    /// Distance between the refresh deadline and the token's `exp`.
    pub expiry_threshold_secs: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            window_width_secs: 60 * 60,
            expiry_threshold_secs: 60 * 60,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitConfig {
    /// Period after the last state change during which failures accumulate.
    pub failure_threshold_secs: i64,

    /// Failures inside the period that open the circuit.
    pub failure_count_threshold: u32,

    /// Time an open circuit refuses calls before allowing a trial call.
    pub stand_down_secs: i64,

    /// Total attempts made by the backoff layer for one guarded call.
    pub max_retries: u32,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold_secs: 5 * 60,
            failure_count_threshold: 3,
            stand_down_secs: 5 * 60,
            max_retries: 2,
        }
    }
}

/// Outbound HTTP configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
