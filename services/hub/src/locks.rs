//! Per-resource mutual exclusion
//!
//! Each resource owns an independent async mutex, so updates to one
//! resource's aggregates never wait on another resource.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;

/// Arena of per-resource locks
#[derive(Debug, Clone)]
pub struct ResourceLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl ResourceLocks {
    /// Create an empty arena whose acquisitions give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Wait for exclusive access to one resource's aggregates
    ///
    /// Fails with [`ApiError::Unavailable`] when the lock is not obtained
    /// within the configured timeout.
    pub async fn acquire(&self, resource_id: Uuid) -> Result<OwnedMutexGuard<()>, ApiError> {
        let lock = Arc::clone(&self.locks.entry(resource_id).or_default());

        tokio::time::timeout(self.timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                warn!("Timed out waiting for lock on resource {}", resource_id);
                ApiError::Unavailable(format!(
                    "Resource {} is busy, please retry",
                    resource_id
                ))
            })
    }

    /// Number of resources that have been locked at least once
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
