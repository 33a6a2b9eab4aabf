use serde::{Deserialize, Serialize};
use snafu::{ensure, Location, OptionExt as _, ResultExt as _, Snafu};
use tracing::instrument;

use crate::auth::Identity;
use crate::model::{now, Listing, ListingId, Timestamp};
use crate::store::{ListingStore, StoreError};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AnalyticsError {
    #[snafu(display("listing `{listing_id}` does not exist"))]
    NotFound {
        listing_id: ListingId,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("only the owner of listing `{listing_id}` or a superuser may view its analytics"))]
    Forbidden {
        listing_id: ListingId,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not load listing `{listing_id}`: {source}"))]
    Load {
        listing_id: ListingId,
        source: StoreError,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityStatus {
    Poor,
    Fair,
    Good,
    #[serde(rename = "Very Good")]
    VeryGood,
    Excellent,
}

impl QualityStatus {
    /// Bands a quality score; each threshold belongs to the band above it.
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s < 30.0 => QualityStatus::Poor,
            s if s < 50.0 => QualityStatus::Fair,
            s if s < 70.0 => QualityStatus::Good,
            s if s < 90.0 => QualityStatus::VeryGood,
            _ => QualityStatus::Excellent,
        }
    }
}

pub const IMPROVE_PRESENTATION: &str =
    "Improve property presentation with better photos and a more detailed description";
pub const FEW_VIEWERS: &str =
    "Fewer than 10 people have seen this listing; review the title and asking price";
pub const SINGLE_VIEWER: &str =
    "All views are from the same user; the listing has not reached new viewers yet";
pub const OWNER_VIEWS: &str =
    "Your own views are part of these numbers; sign out to browse the listing as a visitor";
// issued by the engagement check
pub const MORE_EXPOSURE: &str =
    "Share the listing on social media and other channels to get more exposure";

/// Derived metrics for one listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub listing_id: ListingId,
    pub view_count: u64,
    pub unique_view_count: u64,
    pub unique_viewers: u64,
    pub anonymous_viewers: u64,
    pub last_viewed_at: Option<Timestamp>,

    pub view_quality_score: f64,
    pub view_quality_status: QualityStatus,
    pub engagement_rate: f64,
    pub owner_views: u64,
    pub days_since_creation: i64,
    pub views_per_day: f64,
    pub recommendations: Vec<String>,
}

impl AnalyticsReport {
    pub fn compute(listing: &Listing, now: Timestamp) -> Self {
        let score = quality_score(listing);
        let engagement_rate = engagement_rate(listing);
        let owner_views = owner_views(listing);
        let days_since_creation = days_since(listing.created_at, now);

        let views_per_day = if days_since_creation > 0 {
            listing.unique_view_count as f64 / days_since_creation as f64
        } else {
            0.0
        };

        let recommendations = [
            (score < 50.0, IMPROVE_PRESENTATION),
            (listing.unique_view_count < 10, FEW_VIEWERS),
            (listing.view_count > 0 && listing.unique_view_count == 0, SINGLE_VIEWER),
            (owner_views > 0, OWNER_VIEWS),
            (engagement_rate < 1.5, MORE_EXPOSURE),
        ]
        .into_iter()
        .filter(|(applies, _)| *applies)
        .map(|(_, message)| message.to_string())
        .collect();

        Self {
            listing_id: listing.id.clone(),
            view_count: listing.view_count,
            unique_view_count: listing.unique_view_count,
            unique_viewers: listing.unique_viewers.len() as u64,
            anonymous_viewers: listing.anonymous_viewers.len() as u64,
            last_viewed_at: listing.last_viewed_at,

            view_quality_score: round2(score),
            view_quality_status: QualityStatus::from_score(score),
            engagement_rate,
            owner_views,
            days_since_creation,
            views_per_day: round2(views_per_day),
            recommendations,
        }
    }
}

/// Share of raw views that came from new viewers, in percent.
fn quality_score(listing: &Listing) -> f64 {
    if listing.view_count == 0 {
        return 0.0;
    }

    listing.unique_view_count as f64 / listing.view_count as f64 * 100.0
}

// unique views per distinct viewer; 1.0 whenever the counters are consistent
fn engagement_rate(listing: &Listing) -> f64 {
    let viewers = listing.distinct_viewers();
    if viewers == 0 {
        return 0.0;
    }

    listing.unique_view_count as f64 / viewers as f64
}

fn owner_views(listing: &Listing) -> u64 {
    let owner_has_viewed = listing
        .owner_id
        .as_ref()
        .is_some_and(|owner| listing.unique_viewers.contains(owner));

    u64::from(owner_has_viewed)
}

/// Whole days since `since`, rounding any started day up.
fn days_since(since: Timestamp, now: Timestamp) -> i64 {
    let elapsed = (now - since).num_milliseconds();
    if elapsed <= 0 {
        return 0;
    }

    (elapsed as f64 / MILLIS_PER_DAY).ceil() as i64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Builds analytics reports for listing owners and superusers.
#[derive(Debug, Clone)]
pub struct AnalyticsAggregator<S> {
    listings: S,
}

impl<S: ListingStore + Sync> AnalyticsAggregator<S> {
    pub fn new(listings: S) -> Self {
        Self { listings }
    }

    pub async fn analytics(
        &self, listing_id: &ListingId, requester: &Identity,
    ) -> Result<AnalyticsReport, AnalyticsError> {
        self.analytics_at(listing_id, requester, now()).await
    }

    #[instrument(skip_all, fields(%listing_id, requester = %requester.account_id))]
    pub async fn analytics_at(
        &self, listing_id: &ListingId, requester: &Identity, now: Timestamp,
    ) -> Result<AnalyticsReport, AnalyticsError> {
        let listing = self
            .listings
            .find_listing(listing_id)
            .await
            .context(LoadSnafu { listing_id: listing_id.clone() })?
            .filter(|listing| !listing.is_deleted())
            .context(NotFoundSnafu { listing_id: listing_id.clone() })?;

        ensure!(
            requester.superuser || listing.is_owned_by(&requester.account_id),
            ForbiddenSnafu { listing_id: listing_id.clone() }
        );

        Ok(AnalyticsReport::compute(&listing, now))
    }
}
