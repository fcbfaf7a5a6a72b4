//! Table-driven finite state machine.
//!
//! # Data Flow
//! ```text
//! (current state?, event)
//!     → scan the static transition table for matching rows
//!     → exactly one row: Ok(target state)
//!     → zero or several rows: Err(InvalidTransition)
//! ```
//!
//! # Design Decisions
//! - The table is plain data; the engine holds no state of its own
//! - `None` as a "from" state is a wildcard for "no state yet", and only ever
//!   matches an unset current state
//! - Ambiguous tables fail the same way as missing rows
//! - Only `transition` can fail; the query helpers are total

use std::fmt::Debug;
use thiserror::Error;

/// Raised when a (state, event) pair does not resolve to exactly one row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition from {from} with event {event}")]
pub struct InvalidTransition {
    pub from: String,
    pub event: String,
}

/// One row of a transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S, E> {
    pub from: Option<S>,
    pub event: E,
    pub to: S,
}

impl<S, E> Transition<S, E> {
    pub const fn new(from: Option<S>, event: E, to: S) -> Self {
        Self { from, event, to }
    }
}

/// An ordered, static set of transitions.
#[derive(Debug, Clone, Copy)]
pub struct TransitionTable<S: 'static, E: 'static> {
    transitions: &'static [Transition<S, E>],
}

impl<S, E> TransitionTable<S, E>
where
    S: Copy + Eq + Debug,
    E: Copy + Eq + Debug,
{
    pub const fn new(transitions: &'static [Transition<S, E>]) -> Self {
        Self { transitions }
    }

    pub fn rows(&self) -> &'static [Transition<S, E>] {
        self.transitions
    }

    fn matching(&self, from: Option<S>, event: E) -> impl Iterator<Item = &Transition<S, E>> {
        self.transitions
            .iter()
            .filter(move |t| t.from == from && t.event == event)
    }

    /// Resolve the target state for `event` fired from `from`.
    pub fn transition(&self, from: Option<S>, event: E) -> Result<S, InvalidTransition> {
        let mut rows = self.matching(from, event);
        match (rows.next(), rows.next()) {
            (Some(row), None) => Ok(row.to),
            _ => Err(InvalidTransition {
                from: from.map_or_else(|| "none".to_string(), |s| format!("{:?}", s)),
                event: format!("{:?}", event),
            }),
        }
    }

    /// All events that have a row starting at `from`, in table order.
    pub fn valid_transitions_from(&self, from: Option<S>) -> Vec<E> {
        self.transitions
            .iter()
            .filter(|t| t.from == from)
            .map(|t| t.event)
            .collect()
    }

    pub fn is_valid_transition(&self, from: Option<S>, event: E) -> bool {
        self.matching(from, event).count() == 1
    }
}
