//! Circuit state providers.
//!
//! # Responsibilities
//! - Own the `CircuitRecord` the breaker reads before a call and rewrites after
//! - Offer a process-local record and one persisted through any store
//!
//! # Design Decisions
//! - The breaker never holds the record; it always goes through the provider
//! - Read-then-write is not atomic across processes; concurrent writers race and
//!   the last write wins

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::providers::store::{PersistenceProvider, StoreError};
use crate::resilience::circuit_breaker::{CircuitRecord, CircuitState};

#[async_trait]
pub trait CircuitStateProvider: Send + Sync {
    /// Current circuit state, failure count and last change time.
    async fn record(&self) -> Result<CircuitRecord, StoreError>;

    /// Replace the record, returning what was stored.
    async fn update_state(
        &self,
        failures: u32,
        last_state_change: Option<i64>,
        state: Option<CircuitState>,
    ) -> Result<CircuitRecord, StoreError>;
}

/// A record held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryCircuit {
    record: Mutex<CircuitRecord>,
}

impl InMemoryCircuit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: CircuitRecord) -> Self {
        Self {
            record: Mutex::new(record),
        }
    }
}

#[async_trait]
impl CircuitStateProvider for InMemoryCircuit {
    async fn record(&self) -> Result<CircuitRecord, StoreError> {
        Ok(self.record.lock().await.clone())
    }

    async fn update_state(
        &self,
        failures: u32,
        last_state_change: Option<i64>,
        state: Option<CircuitState>,
    ) -> Result<CircuitRecord, StoreError> {
        let mut record = self.record.lock().await;
        *record = CircuitRecord {
            state,
            failures,
            last_state_change,
        };
        Ok(record.clone())
    }
}

/// A record serialized as JSON into a persistence provider.
///
/// Lets separate processes that share the store share one circuit.
#[derive(Clone)]
pub struct StoreBackedCircuit {
    key: String,
    store: Arc<dyn PersistenceProvider>,
}

impl StoreBackedCircuit {
    pub fn new(name: &str, store: Arc<dyn PersistenceProvider>) -> Self {
        Self {
            key: format!("CIRCUIT#{}", name),
            store,
        }
    }
}

#[async_trait]
impl CircuitStateProvider for StoreBackedCircuit {
    async fn record(&self) -> Result<CircuitRecord, StoreError> {
        match self.store.read(&self.key).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(CircuitRecord::default()),
        }
    }

    async fn update_state(
        &self,
        failures: u32,
        last_state_change: Option<i64>,
        state: Option<CircuitState>,
    ) -> Result<CircuitRecord, StoreError> {
        let record = CircuitRecord {
            state,
            failures,
            last_state_change,
        };
        self.store
            .write(&self.key, &serde_json::to_string(&record)?)
            .await?;
        Ok(record)
    }
}
