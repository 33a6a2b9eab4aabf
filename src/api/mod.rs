use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::store::Store;

mod analytics;
mod error;
mod state;
mod views;

pub use error::ApiError;
pub use state::App;
pub use views::{ViewResponse, SESSION_COOKIE};

pub fn create_router<S: Store>(app: Arc<App<S>>) -> Router {
    Router::new()
        .route(
            "/listings/:listing_id/views",
            post(views::record::<S>).get(views::counters::<S>),
        )
        .route("/listings/:listing_id/analytics", get(analytics::report::<S>))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app)
}
