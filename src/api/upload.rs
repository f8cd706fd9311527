//! Campaign upload endpoint

use crate::api::ApiError;
use crate::core::traits::CampaignService;
use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use di_axum::Inject;
use log::warn;

pub fn router() -> Router {
    Router::new().route("/upload", post(upload_campaign))
}

/// `POST /upload`, multipart form with a `csvFile` file and a `message`
/// template string. Runs the whole campaign before answering: the counts
/// in the response are final for this upload.
async fn upload_campaign(
    Inject(campaign_service): Inject<dyn CampaignService>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<schemas::UploadResponse>), ApiError> {
    let mut csv_file: Option<Vec<u8>> = None;
    let mut message = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidPayload(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("csvFile") => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::InvalidPayload(e.to_string()))?;
                csv_file = Some(data.to_vec());
            }
            Some("message") => {
                message = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidPayload(e.to_string()))?;
            }
            _ => {}
        }
    }

    let csv_file = csv_file.ok_or(ApiError::MissingFile)?;

    let report = campaign_service.run_campaign(&message, &csv_file).await?;

    for row_error in &report.row_errors {
        warn!(
            "upload row {} rejected: {}",
            row_error.row_number, row_error.reason
        );
    }

    Ok((
        StatusCode::OK,
        Json(schemas::UploadResponse {
            processed: report.processed,
            failed: report.failed,
        }),
    ))
}

pub mod schemas {
    use serde::Serialize;

    #[derive(Serialize, Debug)]
    pub struct UploadResponse {
        pub processed: i64,
        pub failed: i64,
    }
}
