use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use snafu::Snafu;

use crate::auth::AuthError;
use crate::model::ListingId;
use crate::service::{AnalyticsError, RecorderError};
use crate::store::StoreError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(transparent)]
    Recorder { source: RecorderError },

    #[snafu(transparent)]
    Analytics { source: AnalyticsError },

    #[snafu(transparent)]
    Auth { source: AuthError },

    #[snafu(display("listing `{listing_id}` does not exist"))]
    ListingNotFound { listing_id: ListingId },

    #[snafu(display("could not load listing `{listing_id}`: {source}"))]
    ListingUnavailable {
        listing_id: ListingId,
        source: StoreError,
    },
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Recorder { source } => match source {
                RecorderError::NotFound { .. } => StatusCode::NOT_FOUND,
                RecorderError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Analytics { source } => match source {
                AnalyticsError::NotFound { .. } => StatusCode::NOT_FOUND,
                AnalyticsError::Forbidden { .. } => StatusCode::FORBIDDEN,
                AnalyticsError::Load { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Auth { source } => match source {
                AuthError::Encode { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::UNAUTHORIZED,
            },
            ApiError::ListingNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::ListingUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self.status() {
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::FORBIDDEN => "forbidden",
            StatusCode::UNAUTHORIZED => "unauthorized",
            _ => "internal",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // internals stay in the log; the caller only learns the request failed
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal error, try again later".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: self.kind(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
