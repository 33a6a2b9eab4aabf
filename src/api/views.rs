use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt as _, ResultExt as _};
use tracing::instrument;

use super::error::{ApiError, ListingNotFoundSnafu, ListingUnavailableSnafu};
use super::state::App;
use crate::model::{ListingId, SessionId, ViewCounters, Viewer};
use crate::service::ViewOutcome;
use crate::store::{ListingStore as _, Store};

/// Cookie that carries the anonymous session id between requests.
pub const SESSION_COOKIE: &str = "viewer_session";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewResponse {
    pub accepted: bool,
    pub is_unique_view: bool,
    pub is_owner_view: bool,
    pub view_count: u64,
    pub unique_view_count: u64,
    pub reason: Option<String>,
}

impl From<ViewOutcome> for ViewResponse {
    fn from(outcome: ViewOutcome) -> Self {
        Self {
            accepted: outcome.accepted,
            is_unique_view: outcome.is_unique_view,
            is_owner_view: outcome.is_owner_view,
            view_count: outcome.view_count,
            unique_view_count: outcome.unique_view_count,
            reason: outcome.rejection.map(|rejection| rejection.reason().to_string()),
        }
    }
}

/// Resolves the anonymous session from its cookie, issuing a fresh one when absent.
fn anonymous_viewer(jar: CookieJar) -> (Viewer, CookieJar) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let session = SessionId::from(cookie.value());
        return (Viewer::Anonymous(session), jar);
    }

    let session = SessionId::generate();
    let cookie = Cookie::build((SESSION_COOKIE, session.to_string()))
        .path("/")
        .http_only(true);

    (Viewer::Anonymous(session), jar.add(cookie))
}

#[instrument(skip(app, headers, jar))]
pub async fn record<S: Store>(
    State(app): State<Arc<App<S>>>, Path(listing_id): Path<ListingId>, headers: HeaderMap,
    jar: CookieJar,
) -> Result<(StatusCode, CookieJar, Json<ViewResponse>), ApiError> {
    let (viewer, jar) = match app.authenticator.identify(&headers)? {
        Some(identity) => (Viewer::Account(identity.account_id), jar),
        None => anonymous_viewer(jar),
    };

    let outcome = app.recorder.record_view(&listing_id, &viewer).await?;

    let status = if outcome.accepted {
        StatusCode::OK
    } else {
        StatusCode::TOO_MANY_REQUESTS
    };

    Ok((status, jar, Json(outcome.into())))
}

#[instrument(skip(app))]
pub async fn counters<S: Store>(
    State(app): State<Arc<App<S>>>, Path(listing_id): Path<ListingId>,
) -> Result<Json<ViewCounters>, ApiError> {
    let listing = app
        .store
        .find_listing(&listing_id)
        .await
        .context(ListingUnavailableSnafu { listing_id: listing_id.clone() })?
        .filter(|listing| !listing.is_deleted())
        .context(ListingNotFoundSnafu { listing_id })?;

    Ok(Json(listing.counters()))
}
