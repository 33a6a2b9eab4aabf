use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use tracing::instrument;

use super::error::ApiError;
use super::state::App;
use crate::model::ListingId;
use crate::service::AnalyticsReport;
use crate::store::Store;

#[instrument(skip(app, headers))]
pub async fn report<S: Store>(
    State(app): State<Arc<App<S>>>, Path(listing_id): Path<ListingId>, headers: HeaderMap,
) -> Result<Json<AnalyticsReport>, ApiError> {
    let identity = app.authenticator.require(&headers)?;
    let report = app.analytics.analytics(&listing_id, &identity).await?;

    Ok(Json(report))
}
