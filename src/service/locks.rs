use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::ListingId;

/// One async mutex per listing, created on demand.
///
/// Holding a [ListingGuard] serializes every read-decide-write for that listing while leaving
/// other listings free to proceed.
#[derive(Debug, Clone, Default)]
pub struct ListingLocks {
    locks: Arc<DashMap<ListingId, Arc<Mutex<()>>>>,
}

impl ListingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, id: &ListingId) -> ListingGuard {
        let mutex = self.locks.entry(id.clone()).or_default().value().clone();
        let guard = mutex.lock_owned().await;

        ListingGuard {
            id: id.clone(),
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Number of listings that currently have a lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[derive(Debug)]
pub struct ListingGuard {
    id: ListingId,
    locks: Arc<DashMap<ListingId, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ListingGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        // the map holds one reference; anything more is a waiter or a holder
        self.locks
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
