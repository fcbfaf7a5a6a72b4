//! Key-value persistence for tokens, key sets, and circuit records.
//!
//! # Responsibilities
//! - Define the narrow read/write contract the core persists through
//! - Provide an in-process store and a JSON file mirror
//!
//! # Design Decisions
//! - Values are opaque strings; callers own their encoding
//! - A missing key is `Ok(None)`, not an error
//! - The file store rewrites the whole document on every write, which is fine
//!   for the handful of keys this crate uses

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Key the self token is persisted under.
pub const BEARER_TOKEN: &str = "BEARER_TOKEN";

/// Key the key set document is persisted under.
pub const JWKS: &str = "JWKS";

/// Errors raised by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Durable key-value store shared across invocations.
#[async_trait]
pub trait PersistenceProvider: Send + Sync {
    /// Write `value` under `key`, returning the stored value.
    async fn write(&self, key: &str, value: &str) -> Result<String, StoreError>;

    /// Read the value under `key`, if any.
    async fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// Process-local store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<DashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl PersistenceProvider for InMemoryStore {
    async fn write(&self, key: &str, value: &str) -> Result<String, StoreError> {
        self.inner.insert(key.to_string(), value.to_string());
        Ok(value.to_string())
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.get(key).map(|r| r.value().clone()))
    }
}

/// Store mirrored to a JSON object on disk.
///
/// Survives process restarts, so a cold start can pick up the token and key
/// set written by a previous run.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PersistenceProvider for JsonFileStore {
    async fn write(&self, key: &str, value: &str) -> Result<String, StoreError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        map.insert(key.to_string(), value.to_string());
        tokio::fs::write(&self.path, serde_json::to_vec(&map)?).await?;
        tracing::debug!(path = ?self.path, key, "Persisted value");
        Ok(value.to_string())
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }
}
