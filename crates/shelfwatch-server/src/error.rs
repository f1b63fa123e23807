use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use shelfwatch_core::error::ScrapeError;

use crate::dto::ErrorResponse;

/// Wrapper so we can implement `IntoResponse` for `ScrapeError`.
pub struct ApiError(pub ScrapeError);

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ScrapeError::Validation(_)
            | ScrapeError::InvalidTransition(_)
            | ScrapeError::Serialization(_) => StatusCode::BAD_REQUEST,
            ScrapeError::Conflict(_) => StatusCode::CONFLICT,
            ScrapeError::NotFound(_) | ScrapeError::AdapterNotFound(_) => StatusCode::NOT_FOUND,
            ScrapeError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ScrapeError::Fetch(_) => StatusCode::BAD_GATEWAY,
            ScrapeError::Extraction(_)
            | ScrapeError::Persistence(_)
            | ScrapeError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorResponse {
            success: false,
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}
