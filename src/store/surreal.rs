use std::collections::BTreeSet;

use derive_new::new;
use serde::{Deserialize, Serialize};
use snafu::ResultExt as _;
use surrealdb::sql::Thing;
use tracing::instrument;

use super::*;
use crate::database::query::ExecuteSnafu;
use crate::database::Database;
use crate::model::{SessionId, Timestamp, Viewer, ViewerActivity};

const FIND_LISTING: &str = "SELECT * FROM type::thing('listings', $id)";

const CREATE_LISTING: &str = "CREATE type::thing('listings', $id) CONTENT $content RETURN NONE";

const SOFT_DELETE_LISTING: &str = "UPDATE type::thing('listings', $id) SET deleted_at = $at \
     WHERE created_at AND !deleted_at RETURN NONE";

// The WHERE clause keeps UPDATE from creating a missing listing and skips soft-deleted ones.
// SET clauses apply in order: the unique increment counts only ids the sets do not hold yet, and
// only the viewer's own activity entry is replaced.
const APPLY_VIEW: &str = "UPDATE type::thing('listings', $id) SET
        view_count += 1,
        unique_view_count += array::len(array::complement($accounts, unique_viewers ?? []))
            + array::len(array::complement($sessions, anonymous_viewers ?? [])),
        unique_viewers = array::union(unique_viewers ?? [], $accounts),
        anonymous_viewers = array::union(anonymous_viewers ?? [], $sessions),
        last_viewed_at = $viewed_at,
        viewer_activity = array::concat(
            viewer_activity[WHERE account != $account] ?? [],
            $activity
        )
    WHERE created_at AND !deleted_at
    RETURN AFTER";

const INCREMENT_LIFETIME_VIEWS: &str =
    "UPDATE type::thing('accounts', $id) SET lifetime_views += 1 RETURN NONE";

const LIFETIME_VIEWS: &str = "SELECT VALUE lifetime_views FROM type::thing('accounts', $id)";

/// Listings and accounts persisted in SurrealDB.
#[derive(Debug, Clone, new)]
pub struct SurrealStore {
    database: Database,
}

impl SurrealStore {
    /// Inserts a listing with the counters it carries. Used when seeding data.
    #[instrument(skip(self, listing), fields(listing_id = %listing.id))]
    pub async fn create_listing(&self, listing: &Listing) -> Result<()> {
        self.database
            .sql(CREATE_LISTING)
            .bind(("id", listing.id.as_str()))
            .bind(("content", ListingContent::from(listing)))
            .execute()
            .await?
            .check()
            .context(ExecuteSnafu)?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: &ListingId, at: Timestamp) -> Result<()> {
        self.database
            .sql(SOFT_DELETE_LISTING)
            .bind(("id", id.as_str()))
            .bind(("at", at))
            .execute()
            .await?
            .check()
            .context(ExecuteSnafu)?;

        Ok(())
    }

    pub async fn lifetime_views(&self, owner: &AccountId) -> Result<u64> {
        let views: Option<u64> = self
            .database
            .sql(LIFETIME_VIEWS)
            .bind(("id", owner.as_str()))
            .fetch()
            .await?;

        Ok(views.unwrap_or(0))
    }
}

impl ListingStore for SurrealStore {
    async fn find_listing(&self, id: &ListingId) -> Result<Option<Listing>> {
        let row: Option<ListingRow> = self
            .database
            .sql(FIND_LISTING)
            .bind(("id", id.as_str()))
            .fetch()
            .await?;

        Ok(row.map(Listing::from))
    }

    async fn apply_view(&self, current: &Listing, delta: &ViewDelta) -> Result<Option<Listing>> {
        let (accounts, sessions) = match (&delta.viewer, delta.unique) {
            (Viewer::Account(id), true) => (vec![id.clone()], vec![]),
            (Viewer::Anonymous(id), true) => (vec![], vec![id.clone()]),
            (_, false) => (vec![], vec![]),
        };

        let activity: Vec<ActivityRow> = match (&delta.viewer, delta.activity) {
            (Viewer::Account(id), Some(activity)) => vec![ActivityRow::new(id.clone(), activity)],
            _ => vec![],
        };

        let row: Option<ListingRow> = self
            .database
            .sql(APPLY_VIEW)
            .bind(("id", current.id.as_str()))
            .bind(("accounts", accounts))
            .bind(("sessions", sessions))
            .bind(("viewed_at", delta.viewed_at))
            .bind(("account", delta.viewer.account()))
            .bind(("activity", activity))
            .fetch()
            .await?;

        Ok(row.map(Listing::from))
    }
}

impl AccountStore for SurrealStore {
    async fn increment_lifetime_views(&self, owner: &AccountId) -> Result<()> {
        self.database
            .sql(INCREMENT_LIFETIME_VIEWS)
            .bind(("id", owner.as_str()))
            .execute()
            .await?
            .check()
            .context(ExecuteSnafu)?;

        Ok(())
    }
}

/// A listing as stored; the record id comes back as a [Thing].
#[derive(Debug, Deserialize)]
struct ListingRow {
    id: Thing,
    owner_id: Option<AccountId>,
    created_at: Timestamp,
    #[serde(default)]
    deleted_at: Option<Timestamp>,
    #[serde(default)]
    view_count: u64,
    #[serde(default)]
    unique_view_count: u64,
    #[serde(default)]
    unique_viewers: BTreeSet<AccountId>,
    #[serde(default)]
    anonymous_viewers: BTreeSet<SessionId>,
    #[serde(default)]
    last_viewed_at: Option<Timestamp>,
    #[serde(default)]
    viewer_activity: Vec<ActivityRow>,
}

/// One viewer's repeat-view window. Kept as a list so a single entry can be replaced in place.
#[derive(Debug, Serialize, Deserialize)]
struct ActivityRow {
    account: AccountId,
    views: u32,
    window_started_at: Timestamp,
}

impl ActivityRow {
    fn new(account: AccountId, activity: ViewerActivity) -> Self {
        Self {
            account,
            views: activity.views,
            window_started_at: activity.window_started_at,
        }
    }

    fn into_entry(self) -> (AccountId, ViewerActivity) {
        (self.account, ViewerActivity::new(self.views, self.window_started_at))
    }
}

impl From<ListingRow> for Listing {
    fn from(row: ListingRow) -> Self {
        Listing {
            id: row.id.id.to_raw().into(),
            owner_id: row.owner_id,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
            view_count: row.view_count,
            unique_view_count: row.unique_view_count,
            unique_viewers: row.unique_viewers,
            anonymous_viewers: row.anonymous_viewers,
            last_viewed_at: row.last_viewed_at,
            viewer_activity: row
                .viewer_activity
                .into_iter()
                .map(ActivityRow::into_entry)
                .collect(),
        }
    }
}

/// The record body written on creation; the id lives in the record key instead.
#[derive(Debug, Serialize)]
struct ListingContent<'a> {
    owner_id: &'a Option<AccountId>,
    created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted_at: Option<Timestamp>,
    view_count: u64,
    unique_view_count: u64,
    unique_viewers: &'a BTreeSet<AccountId>,
    anonymous_viewers: &'a BTreeSet<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_viewed_at: Option<Timestamp>,
    viewer_activity: Vec<ActivityRow>,
}

impl<'a> From<&'a Listing> for ListingContent<'a> {
    fn from(listing: &'a Listing) -> Self {
        ListingContent {
            owner_id: &listing.owner_id,
            created_at: listing.created_at,
            deleted_at: listing.deleted_at,
            view_count: listing.view_count,
            unique_view_count: listing.unique_view_count,
            unique_viewers: &listing.unique_viewers,
            anonymous_viewers: &listing.anonymous_viewers,
            last_viewed_at: listing.last_viewed_at,
            viewer_activity: listing
                .viewer_activity
                .iter()
                .map(|(account, activity)| ActivityRow::new(account.clone(), *activity))
                .collect(),
        }
    }
}
