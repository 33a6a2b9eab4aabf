use std::collections::{BTreeMap, BTreeSet};

use super::*;

/// The view-tracking slice of a property listing.
///
/// The listing store owns the record; only the view recorder mutates the counters below.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, new)]
pub struct Listing {
    pub id: ListingId,
    pub owner_id: Option<AccountId>,
    #[new(value = "now()")]
    pub created_at: Timestamp,
    #[new(default)]
    #[serde(default)]
    pub deleted_at: Option<Timestamp>,

    #[new(default)]
    #[serde(default)]
    pub view_count: u64,
    #[new(default)]
    #[serde(default)]
    pub unique_view_count: u64,
    #[new(default)]
    #[serde(default)]
    pub unique_viewers: BTreeSet<AccountId>,
    #[new(default)]
    #[serde(default)]
    pub anonymous_viewers: BTreeSet<SessionId>,
    #[new(default)]
    #[serde(default)]
    pub last_viewed_at: Option<Timestamp>,

    /// Repeat-view bookkeeping for signed-in viewers, keyed by account.
    #[new(default)]
    #[serde(default)]
    pub viewer_activity: BTreeMap<AccountId, ViewerActivity>,
}

impl Listing {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_owned_by(&self, account: &AccountId) -> bool {
        self.owner_id.as_ref() == Some(account)
    }

    /// Whether `viewer` has already been credited with a unique view.
    pub fn has_seen(&self, viewer: &Viewer) -> bool {
        match viewer {
            Viewer::Account(id) => self.unique_viewers.contains(id),
            Viewer::Anonymous(id) => self.anonymous_viewers.contains(id),
        }
    }

    pub fn distinct_viewers(&self) -> u64 {
        (self.unique_viewers.len() + self.anonymous_viewers.len()) as u64
    }

    pub fn counters(&self) -> ViewCounters {
        ViewCounters {
            view_count: self.view_count,
            unique_view_count: self.unique_view_count,
            last_viewed_at: self.last_viewed_at,
        }
    }

    /// Applies an accepted observation in memory. Stores that cannot issue a single update
    /// statement use this under their own write lock.
    pub fn apply(&mut self, delta: &ViewDelta) {
        self.view_count += 1;
        self.last_viewed_at = Some(delta.viewed_at);

        if let Some(activity) = &delta.activity {
            if let Viewer::Account(id) = &delta.viewer {
                self.viewer_activity.insert(id.clone(), *activity);
            }
        }

        if !delta.unique {
            return;
        }

        let inserted = match &delta.viewer {
            Viewer::Account(id) => self.unique_viewers.insert(id.clone()),
            Viewer::Anonymous(id) => self.anonymous_viewers.insert(id.clone()),
        };

        if inserted {
            self.unique_view_count += 1;
        }
    }
}

/// Repeat views by a single signed-in viewer inside the current abuse window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct ViewerActivity {
    pub views: u32,
    pub window_started_at: Timestamp,
}

impl ViewerActivity {
    pub fn first(now: Timestamp) -> Self {
        Self::new(1, now)
    }

    /// The activity after one more accepted view at `now`, restarting the window once it lapsed.
    pub fn next(self, window: Duration, now: Timestamp) -> Self {
        if self.window_started_at.is_within(window, now) {
            Self::new(self.views.saturating_add(1), self.window_started_at)
        } else {
            Self::first(now)
        }
    }

    /// Views already counted in a window that is still open at `now`.
    pub fn views_in_window(&self, window: Duration, now: Timestamp) -> u32 {
        if self.window_started_at.is_within(window, now) {
            self.views
        } else {
            0
        }
    }
}

/// The change an accepted observation makes to a listing, issued to the store as one update.
#[derive(Debug, Clone, PartialEq, new)]
pub struct ViewDelta {
    pub viewer: Viewer,
    pub unique: bool,
    pub viewed_at: Timestamp,
    pub activity: Option<ViewerActivity>,
}

/// Publicly readable counters of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ViewCounters {
    pub view_count: u64,
    pub unique_view_count: u64,
    pub last_viewed_at: Option<Timestamp>,
}
