use crate::core::traits::CampaignError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;
use serde_json::json;
use thiserror::Error;

pub mod monitoring;
pub mod upload;

/// Request-level failures, surfaced to the client as `{"error": ...}`.
/// Everything row- or message-level stays inside the campaign report.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No CSV file uploaded")]
    MissingFile,

    #[error("invalid upload payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Campaign(#[from] CampaignError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::MissingFile | ApiError::InvalidPayload(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::Campaign(CampaignError::EmptyTemplate)
            | ApiError::Campaign(CampaignError::NoValidContacts)
            | ApiError::Campaign(CampaignError::Ingest(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::Campaign(CampaignError::Store(e)) => {
                error!("store error surfaced to API: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
