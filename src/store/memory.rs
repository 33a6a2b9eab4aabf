use std::sync::Arc;

use dashmap::DashMap;

use super::*;
use crate::model::Timestamp;

/// A process-local store backed by concurrent maps.
///
/// Every update to a listing happens while holding its map shard, so `apply_view` is atomic
/// per listing just like the database statement.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    listings: Arc<DashMap<ListingId, Listing>>,
    lifetime_views: Arc<DashMap<AccountId, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, listing: Listing) {
        self.listings.insert(listing.id.clone(), listing);
    }

    /// Marks a listing as deleted, keeping its counters. Returns whether it existed.
    pub fn soft_delete(&self, id: &ListingId, at: Timestamp) -> bool {
        match self.listings.get_mut(id) {
            Some(mut listing) => {
                listing.deleted_at.get_or_insert(at);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &ListingId) -> Option<Listing> {
        self.listings.get(id).map(|entry| entry.value().clone())
    }

    pub fn lifetime_views(&self, owner: &AccountId) -> u64 {
        self.lifetime_views.get(owner).map_or(0, |entry| *entry)
    }
}

impl ListingStore for MemoryStore {
    async fn find_listing(&self, id: &ListingId) -> Result<Option<Listing>> {
        Ok(self.get(id))
    }

    async fn apply_view(&self, current: &Listing, delta: &ViewDelta) -> Result<Option<Listing>> {
        let Some(mut listing) = self.listings.get_mut(&current.id) else {
            return Ok(None);
        };

        if listing.is_deleted() {
            return Ok(None);
        }

        listing.apply(delta);
        Ok(Some(listing.value().clone()))
    }
}

impl AccountStore for MemoryStore {
    async fn increment_lifetime_views(&self, owner: &AccountId) -> Result<()> {
        *self.lifetime_views.entry(owner.clone()).or_insert(0) += 1;
        Ok(())
    }
}
