//! Metrics collection.
//!
//! # Responsibilities
//! - Define the token core's counters
//! - Leave exposition to the embedding application's recorder
//!
//! # Metrics
//! - `selftoken_grants_total` (counter): client-credentials grants by outcome
//! - `selftoken_cache_misses_total` (counter): token cache invalidations
//! - `selftoken_circuit_transitions_total` (counter): circuit state changes by target state
//! - `selftoken_circuit_rejections_total` (counter): calls refused while open
//! - `selftoken_http_retries_total` (counter): backoff retries by step
//! - `selftoken_jwks_fetches_total` (counter): key set fetches by outcome
//!
//! # Design Decisions
//! - No recorder is installed here; without one every call is a no-op

use metrics::counter;

pub fn record_grant(outcome: &'static str) {
    counter!("selftoken_grants_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_miss() {
    counter!("selftoken_cache_misses_total").increment(1);
}

pub fn record_circuit_transition(to: &'static str) {
    counter!("selftoken_circuit_transitions_total", "to" => to).increment(1);
}

pub fn record_circuit_rejection() {
    counter!("selftoken_circuit_rejections_total").increment(1);
}

pub fn record_retry(step: &str) {
    counter!("selftoken_http_retries_total", "step" => step.to_string()).increment(1);
}

pub fn record_jwks_fetch(outcome: &'static str) {
    counter!("selftoken_jwks_fetches_total", "outcome" => outcome).increment(1);
}
