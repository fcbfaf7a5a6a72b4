//! Collaborator contracts supplied by the embedding application.
//!
//! # Data Flow
//! ```text
//! TokenManager ──▶ env.rs     (client credentials, bearer token write-back)
//!              ──▶ store.rs   (token persisted across invocations)
//! KeySetValidator ─▶ store.rs (JWKS document mirror)
//! CircuitBreaker ──▶ circuit.rs (failure bookkeeping)
//! ```
//!
//! # Design Decisions
//! - Each contract is a trait; adapters per backing store live beside it
//! - Shared as `Arc<dyn Trait>` so one store can serve several consumers

pub mod circuit;
pub mod env;
pub mod store;

pub use circuit::{CircuitStateProvider, InMemoryCircuit, StoreBackedCircuit};
pub use env::{EnvironmentAccessor, ProcessEnv, StaticEnv};
pub use store::{InMemoryStore, JsonFileStore, PersistenceProvider, StoreError};
