use std::future::Future;

use snafu::{Location, Snafu};

use crate::database::QueryError;
use crate::model::{AccountId, Listing, ListingId, ViewDelta};

pub mod memory;
pub mod surreal;

pub use memory::MemoryStore;
pub use surreal::SurrealStore;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(transparent)]
    Query { source: QueryError },

    #[snafu(display("the {store} store is unavailable at {location}: {message}"))]
    Unavailable {
        store: &'static str,
        message: String,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Read/write access to the listings the recorder and aggregator work on.
pub trait ListingStore {
    /// Fetch a listing by id. Soft-deleted listings are returned as-is; callers decide.
    fn find_listing(
        &self, id: &ListingId,
    ) -> impl Future<Output = Result<Option<Listing>>> + Send;

    /// Apply an accepted observation as a single update. `current` is the snapshot the decision
    /// was made against; the update itself never credits a viewer the listing already holds, even
    /// when that snapshot is stale. Returns the listing after the update, or `None` when it no
    /// longer exists or has been soft-deleted.
    fn apply_view(
        &self, current: &Listing, delta: &ViewDelta,
    ) -> impl Future<Output = Result<Option<Listing>>> + Send;
}

/// The account record's aggregate view counter, which outlives individual listings.
pub trait AccountStore {
    fn increment_lifetime_views(
        &self, owner: &AccountId,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Everything the HTTP layer needs from a backend.
pub trait Store: ListingStore + AccountStore + Clone + Send + Sync + 'static {}

impl<T> Store for T where T: ListingStore + AccountStore + Clone + Send + Sync + 'static {}
