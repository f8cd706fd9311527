//! Health and metrics endpoints, polled by the dashboard

use crate::api::ApiError;
use crate::core::traits::CampaignService;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use di_axum::Inject;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics_summary", get(metrics_summary))
}

/// `GET /health`. Always 200; an unhealthy store is reported in the body
/// so the dashboard can render it instead of treating it as a fetch error.
async fn health(
    Inject(campaign_service): Inject<dyn CampaignService>,
) -> (StatusCode, Json<schemas::HealthResponse>) {
    let report = campaign_service.health().await;

    (StatusCode::OK, Json(schemas::HealthResponse::from(report)))
}

/// `GET /metrics_summary`. Recomputed from the store on every call, so the
/// dashboard may observe a campaign mid-flight (pending > 0).
async fn metrics_summary(
    Inject(campaign_service): Inject<dyn CampaignService>,
) -> Result<(StatusCode, Json<schemas::MetricsResponse>), ApiError> {
    let report = campaign_service.metrics_summary().await?;

    Ok((StatusCode::OK, Json(schemas::MetricsResponse::from(report))))
}

pub mod schemas {
    use crate::core::traits::{HealthReport, MetricsReport};
    use crate::infrastructure::entities;
    use serde::Serialize;

    #[derive(Serialize, Debug)]
    pub struct HealthStats {
        pub response_time_ms: f64,
    }

    #[derive(Serialize, Debug)]
    pub struct HealthResponse {
        pub status: &'static str,
        pub database: String,
        pub version: &'static str,
        pub stats: HealthStats,
    }

    impl From<HealthReport> for HealthResponse {
        fn from(report: HealthReport) -> Self {
            HealthResponse {
                status: if report.healthy { "healthy" } else { "unhealthy" },
                database: report.database,
                version: env!("CARGO_PKG_VERSION"),
                stats: HealthStats {
                    response_time_ms: report.response_time_ms,
                },
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct Summary {
        pub total_messages: i64,
        pub success_count: i64,
        pub failed_count: i64,
        pub pending_count: i64,
        pub success_rate_percent: f64,
    }

    #[derive(Serialize, Debug)]
    pub struct RecentMessage {
        pub id: i64,
        pub phone_number: String,
        pub status: &'static str,
        pub error_message: Option<String>,
    }

    impl From<entities::Message> for RecentMessage {
        fn from(message: entities::Message) -> Self {
            RecentMessage {
                id: message.id,
                phone_number: message.phone_number,
                status: message.status.as_str(),
                error_message: message.error_message,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct MetricsResponse {
        pub summary: Summary,
        pub recent_messages: Vec<RecentMessage>,
    }

    impl From<MetricsReport> for MetricsResponse {
        fn from(report: MetricsReport) -> Self {
            MetricsResponse {
                summary: Summary {
                    total_messages: report.counts.total_messages,
                    success_count: report.counts.success_count,
                    failed_count: report.counts.failed_count,
                    pending_count: report.counts.pending_count,
                    success_rate_percent: report.success_rate_percent,
                },
                recent_messages: report.recent.into_iter().map(RecentMessage::from).collect(),
            }
        }
    }
}
