//! Lazily populated single-value cache.
//!
//! # Responsibilities
//! - Hold at most one value, populated on first demand
//! - Run one population at a time; concurrent callers wait and share the result
//! - Drop the value on explicit invalidation
//!
//! # Design Decisions
//! - Reads go through `ArcSwapOption` and never take a lock
//! - A failed population leaves the cache empty; the next call tries again
//! - The value is handed out as `Arc<T>` so callers never clone the payload

use arc_swap::ArcSwapOption;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct LazyCache<T> {
    value: ArcSwapOption<T>,
    populating: Mutex<()>,
}

impl<T> Default for LazyCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LazyCache<T> {
    pub fn new() -> Self {
        Self {
            value: ArcSwapOption::empty(),
            populating: Mutex::new(()),
        }
    }

    /// The cached value, if populated.
    pub fn peek(&self) -> Option<Arc<T>> {
        self.value.load_full()
    }

    /// Return the cached value, or run `populate` and cache its result.
    pub async fn get_or_populate<E, F, Fut>(&self, populate: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.peek() {
            return Ok(value);
        }

        let _guard = self.populating.lock().await;
        // Another caller may have populated while we waited.
        if let Some(value) = self.peek() {
            return Ok(value);
        }

        let value = Arc::new(populate().await?);
        self.value.store(Some(Arc::clone(&value)));
        Ok(value)
    }

    pub fn invalidate(&self) {
        self.value.store(None);
    }
}

impl<T> fmt::Debug for LazyCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyCache")
            .field("populated", &self.value.load().is_some())
            .finish()
    }
}
