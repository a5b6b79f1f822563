//! HTTP mapping of library errors.
//!
//! Conversion routes answer in plain text; JSON routes answer
//! `{"error": <message>, "status": <code>}`.

use crate::error::{ConvertError, RatingError, ValidationError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

impl ConvertError {
    /// Status code for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ConvertError::Validation(e) if e.is_oversize() => StatusCode::PAYLOAD_TOO_LARGE,
            ConvertError::Validation(_) => StatusCode::BAD_REQUEST,
            ConvertError::Conversion(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ConvertError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ConvertError::Validation(e) => {
                warn!("Rejected upload: {}", e);
                e.to_string()
            }
            ConvertError::Conversion(e) => {
                error!("Conversion error: {}", e);
                format!("An error occurred: {}", e)
            }
        };
        (status, body).into_response()
    }
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        ConvertError::from(self).into_response()
    }
}

/// Errors of the JSON endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    /// Duplicate vote, carrying the already-localised message.
    #[error("{0}")]
    AlreadyVoted(String),

    #[error(transparent)]
    Rating(#[from] RatingError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::AlreadyVoted(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::Rating(RatingError::InvalidRating(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::Rating(RatingError::AlreadyVotedToday) => {
                (StatusCode::FORBIDDEN, self.to_string())
            }
            ApiError::Rating(e) => {
                error!("Rating store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Rating storage error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
