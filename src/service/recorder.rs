use chrono::Duration;
use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};
use tracing::instrument;

use super::locks::ListingLocks;
use crate::model::{now, AccountId, Listing, ListingId, Timestamp, ViewDelta, Viewer, ViewerActivity};
use crate::store::{AccountStore, ListingStore, StoreError};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RecorderError {
    #[snafu(display("listing `{listing_id}` does not exist"))]
    NotFound {
        listing_id: ListingId,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not record a view of listing `{listing_id}`: {source}"))]
    Persistence {
        listing_id: ListingId,
        source: StoreError,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Thresholds that decide whether an observation is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderPolicy {
    /// Minimum time between the listing's last view and a counted view by its owner.
    pub owner_cooldown: Duration,
    /// Accepted views a signed-in viewer may accumulate inside one abuse window.
    pub repeat_limit: u32,
    pub abuse_window: Duration,
}

impl Default for RecorderPolicy {
    fn default() -> Self {
        Self {
            owner_cooldown: Duration::hours(1),
            repeat_limit: 5,
            abuse_window: Duration::hours(1),
        }
    }
}

/// Why an observation was not counted. Rejections are expected outcomes, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    OwnerRateLimited,
    ExcessiveViewing,
}

impl Rejection {
    pub fn reason(self) -> &'static str {
        match self {
            Rejection::OwnerRateLimited => "owner view rate limited",
            Rejection::ExcessiveViewing => "excessive viewing detected",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

/// Result of a single observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOutcome {
    pub accepted: bool,
    pub is_unique_view: bool,
    pub is_owner_view: bool,
    pub view_count: u64,
    pub unique_view_count: u64,
    pub rejection: Option<Rejection>,
}

impl ViewOutcome {
    fn accepted(listing: &Listing, is_unique_view: bool, is_owner_view: bool) -> Self {
        Self {
            accepted: true,
            is_unique_view,
            is_owner_view,
            view_count: listing.view_count,
            unique_view_count: listing.unique_view_count,
            rejection: None,
        }
    }

    fn rejected(listing: &Listing, is_owner_view: bool, rejection: Rejection) -> Self {
        Self {
            accepted: false,
            is_unique_view: false,
            is_owner_view,
            view_count: listing.view_count,
            unique_view_count: listing.unique_view_count,
            rejection: Some(rejection),
        }
    }
}

/// What to do with an observation, decided against one snapshot of the listing.
#[derive(Debug, Clone, PartialEq)]
enum Decision {
    Reject(Rejection),
    Accept(ViewDelta),
}

fn decide(
    listing: &Listing, viewer: &Viewer, is_owner_view: bool, policy: &RecorderPolicy,
    now: Timestamp,
) -> Decision {
    let last_viewed_recently = listing
        .last_viewed_at
        .is_some_and(|at| at.is_within(policy.owner_cooldown, now));

    if is_owner_view && last_viewed_recently {
        return Decision::Reject(Rejection::OwnerRateLimited);
    }

    let activity = match viewer {
        Viewer::Account(id) => {
            let previous = listing.viewer_activity.get(id).copied();
            let views = previous.map_or(0, |a| a.views_in_window(policy.abuse_window, now));

            if views > policy.repeat_limit {
                return Decision::Reject(Rejection::ExcessiveViewing);
            }

            Some(match previous {
                Some(activity) => activity.next(policy.abuse_window, now),
                None => ViewerActivity::first(now),
            })
        }
        Viewer::Anonymous(_) => None,
    };

    let unique = !listing.has_seen(viewer);
    Decision::Accept(ViewDelta::new(viewer.clone(), unique, now, activity))
}

/// Counts listing views: decides whether an observation counts, whether it is unique, and
/// updates the listing's counters.
#[derive(Debug, Clone)]
pub struct ViewRecorder<S, A> {
    listings: S,
    accounts: A,
    locks: ListingLocks,
    policy: RecorderPolicy,
}

impl<S, A> ViewRecorder<S, A>
where
    S: ListingStore + Sync,
    A: AccountStore + Clone + Send + Sync + 'static,
{
    pub fn new(listings: S, accounts: A, policy: RecorderPolicy) -> Self {
        Self {
            listings,
            accounts,
            locks: ListingLocks::new(),
            policy,
        }
    }

    pub async fn record_view(
        &self, listing_id: &ListingId, viewer: &Viewer,
    ) -> Result<ViewOutcome, RecorderError> {
        self.record_view_at(listing_id, viewer, now()).await
    }

    #[instrument(skip_all, fields(%listing_id, %viewer))]
    pub async fn record_view_at(
        &self, listing_id: &ListingId, viewer: &Viewer, now: Timestamp,
    ) -> Result<ViewOutcome, RecorderError> {
        let _guard = self.locks.lock(listing_id).await;

        let listing = self
            .listings
            .find_listing(listing_id)
            .await
            .context(PersistenceSnafu { listing_id: listing_id.clone() })?
            .filter(|listing| !listing.is_deleted())
            .context(NotFoundSnafu { listing_id: listing_id.clone() })?;

        let is_owner_view = viewer.account().is_some_and(|id| listing.is_owned_by(id));

        let delta = match decide(&listing, viewer, is_owner_view, &self.policy, now) {
            Decision::Reject(rejection) => {
                tracing::info!(%rejection, is_owner_view, "view rejected");
                return Ok(ViewOutcome::rejected(&listing, is_owner_view, rejection));
            }
            Decision::Accept(delta) => delta,
        };

        let updated = self
            .listings
            .apply_view(&listing, &delta)
            .await
            .context(PersistenceSnafu { listing_id: listing_id.clone() })?
            .context(NotFoundSnafu { listing_id: listing_id.clone() })?;

        tracing::debug!(
            unique = delta.unique,
            view_count = updated.view_count,
            unique_view_count = updated.unique_view_count,
            "view recorded"
        );

        if let Some(owner) = &updated.owner_id {
            self.credit_owner(owner.clone());
        }

        Ok(ViewOutcome::accepted(&updated, delta.unique, is_owner_view))
    }

    /// Bumps the owner's lifetime view total in the background. Failures are only logged.
    fn credit_owner(&self, owner: AccountId) {
        let accounts = self.accounts.clone();

        tokio::spawn(async move {
            if let Err(error) = accounts.increment_lifetime_views(&owner).await {
                tracing::warn!(%owner, %error, "could not increment owner lifetime views");
            }
        });
    }
}
