//! Circuit breaker for identity provider protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Half-Open: recent failures, calls still pass through and are counted
//! - Open: provider assumed down, calls fail fast during the stand-down period
//! - Half-Closed: an open circuit saw one success and is recovering
//!
//! # State Transitions
//! ```text
//! none/half_closed             --failure-->            half_open
//! none/half_open/half_closed   --persistent_failure--> open
//! none/half_closed/half_open   --success-->            closed
//! open                         --success-->            half_closed
//! closed                       --success-->            closed
//! ```
//!
//! # Design Decisions
//! - The record is owned by a `CircuitStateProvider`; the breaker only reads it
//!   before the call and rewrites it afterwards
//! - Without a provider the breaker is a pass-through
//! - A failure counts towards the threshold together with the failures already
//!   recorded since the last state change
//! - A failure while `closed` starts a new cycle as if no state were recorded
//! - A failed trial call after the stand-down re-opens the circuit and restarts it
//! - Bookkeeping is best effort: provider errors are logged, the call's own
//!   result is still returned

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::clock::{self, Clock};
use crate::config::schema::CircuitConfig;
use crate::fsm::{Transition, TransitionTable};
use crate::observability::metrics;
use crate::providers::circuit::CircuitStateProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    HalfOpen,
    HalfClosed,
    Open,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::HalfOpen => "half_open",
            CircuitState::HalfClosed => "half_closed",
            CircuitState::Open => "open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitEvent {
    Failure,
    PersistentFailure,
    Success,
}

use CircuitEvent::{Failure, PersistentFailure, Success};
use CircuitState::{Closed, HalfClosed, HalfOpen, Open};

pub const CIRCUIT_TABLE: TransitionTable<CircuitState, CircuitEvent> = TransitionTable::new(&[
    Transition::new(None, Failure, HalfOpen),
    Transition::new(None, PersistentFailure, Open),
    Transition::new(Some(HalfOpen), PersistentFailure, Open),
    Transition::new(Some(HalfClosed), PersistentFailure, Open),
    Transition::new(Some(HalfClosed), Failure, HalfOpen),
    Transition::new(Some(HalfOpen), Success, Closed),
    Transition::new(Some(Open), Success, HalfClosed),
    Transition::new(Some(Closed), Success, Closed),
    Transition::new(Some(HalfClosed), Success, Closed),
    Transition::new(None, Success, Closed),
]);

/// Failure bookkeeping for one protected dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitRecord {
    pub state: Option<CircuitState>,
    pub failures: u32,
    /// Epoch seconds of the last state change.
    pub last_state_change: Option<i64>,
}

/// Returned instead of calling through while the circuit is open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit open ({state}, {failures} failures)")]
pub struct CircuitOpen {
    pub state: CircuitState,
    pub failures: u32,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitConfig,
    clock: Arc<dyn Clock>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitConfig) -> Self {
        Self::with_clock(config, clock::system())
    }

    pub fn with_clock(config: CircuitConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    /// Run `call` under the circuit tracked by `provider`.
    pub async fn guard<T, E, F, Fut>(
        &self,
        provider: Option<&dyn CircuitStateProvider>,
        call: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpen>,
    {
        let Some(provider) = provider else {
            return call().await;
        };

        let record = match provider.record().await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "Circuit state unreadable, calling through");
                return call().await;
            }
        };

        let now = self.clock.now();
        if let Some(open) = self.standing_down(&record, now) {
            tracing::debug!(failures = open.failures, "Circuit open, refusing call");
            metrics::record_circuit_rejection();
            return Err(open.into());
        }

        let result = call().await;

        let next = match &result {
            Ok(_) => self.after_success(&record, now),
            Err(_) => self.after_failure(&record, now),
        };
        if let Some(next) = next {
            self.write(provider, &record, next).await;
        }

        result
    }

    fn standing_down(&self, record: &CircuitRecord, now: i64) -> Option<CircuitOpen> {
        match (record.state, record.last_state_change) {
            (Some(Open), Some(changed)) if now - changed < self.config.stand_down_secs => {
                Some(CircuitOpen {
                    state: Open,
                    failures: record.failures,
                })
            }
            _ => None,
        }
    }

    fn exhausted(&self, record: &CircuitRecord, now: i64, failures: u32) -> bool {
        match record.last_state_change {
            None => false,
            Some(changed) => {
                now - changed < self.config.failure_threshold_secs
                    && failures >= self.config.failure_count_threshold
            }
        }
    }

    fn after_failure(&self, record: &CircuitRecord, now: i64) -> Option<CircuitRecord> {
        let failures = record.failures.saturating_add(1);

        if self.exhausted(record, now, failures) {
            if record.state == Some(Open) {
                return None;
            }
            return fire(record.state, PersistentFailure).map(|to| CircuitRecord {
                state: Some(to),
                failures: 0,
                last_state_change: Some(now),
            });
        }

        let next = match fire(record.state, Failure) {
            Some(to) if Some(to) != record.state => CircuitRecord {
                state: Some(to),
                failures,
                last_state_change: Some(now),
            },
            None if record.state == Some(Open) => CircuitRecord {
                state: Some(Open),
                failures: 0,
                last_state_change: Some(now),
            },
            _ => CircuitRecord {
                failures,
                ..record.clone()
            },
        };
        Some(next)
    }

    fn after_success(&self, record: &CircuitRecord, now: i64) -> Option<CircuitRecord> {
        match CIRCUIT_TABLE.transition(record.state, Success) {
            Ok(to) if Some(to) != record.state => Some(CircuitRecord {
                state: Some(to),
                failures: 0,
                last_state_change: Some(now),
            }),
            _ => None,
        }
    }

    async fn write(
        &self,
        provider: &dyn CircuitStateProvider,
        previous: &CircuitRecord,
        next: CircuitRecord,
    ) {
        if previous.state != next.state || previous.last_state_change != next.last_state_change {
            if let Some(to) = next.state {
                tracing::info!(
                    from = previous.state.map_or("none", |s| s.as_str()),
                    to = to.as_str(),
                    failures = previous.failures,
                    "Circuit state change"
                );
                metrics::record_circuit_transition(to.as_str());
            }
        }

        if let Err(e) = provider
            .update_state(next.failures, next.last_state_change, next.state)
            .await
        {
            tracing::warn!(error = %e, "Failed to record circuit state");
        }
    }
}

fn fire(from: Option<CircuitState>, event: CircuitEvent) -> Option<CircuitState> {
    match CIRCUIT_TABLE.transition(from, event) {
        Ok(to) => Some(to),
        Err(_) if from == Some(Closed) => CIRCUIT_TABLE.transition(None, event).ok(),
        Err(e) => {
            tracing::debug!(error = %e, "Circuit transition rejected");
            None
        }
    }
}
