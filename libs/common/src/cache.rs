//! In-process cache module for the resource hub
//!
//! This module provides a single-slot cache with a time-to-live, used to
//! serve derived views that are expensive to recompute but may be slightly
//! stale.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Single-value cache whose content expires after a fixed TTL
///
/// Concurrent callers that miss the cache are serialized, so at most one
/// recomputation runs at a time. A zero TTL disables caching.
#[derive(Debug, Clone)]
pub struct TtlCache<T> {
    ttl: Duration,
    slot: Arc<Mutex<Option<(Instant, T)>>>,
}

impl<T: Clone> TtlCache<T> {
    /// Create an empty cache with the given time-to-live
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Maximum age of a value served from the cache
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value, or compute and store a fresh one
    ///
    /// A failed computation leaves the previous slot untouched and is
    /// returned to the caller.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, compute: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some((stored_at, value)) = slot.as_ref() {
            if stored_at.elapsed() < self.ttl {
                debug!("Serving cached value");
                return Ok(value.clone());
            }
        }

        let value = compute().await?;
        *slot = Some((Instant::now(), value.clone()));
        Ok(value)
    }

    /// Drop the cached value
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}
