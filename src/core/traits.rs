//! DI "Interfaces"

use crate::core::ingest::{IngestError, RowError};
use crate::infrastructure::entities::{Message, StatusCounts};
use crate::infrastructure::traits::StoreError;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Request-level campaign failures. Per-contact failures never surface
/// here; they are recorded on the individual messages instead.
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("message template is empty")]
    EmptyTemplate,

    #[error("no valid contacts found in CSV file")]
    NoValidContacts,

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one campaign run, computed after every worker finished.
#[derive(Debug)]
pub struct CampaignReport {
    pub campaign_id: Uuid,
    /// Terminal dispatch attempts: success + failed.
    pub processed: i64,
    pub failed: i64,
    /// Rows that never became contacts, with their reasons.
    pub row_errors: Vec<RowError>,
}

/// Aggregate view over the message store plus the recent-activity feed.
#[derive(Debug)]
pub struct MetricsReport {
    pub counts: StatusCounts,
    /// success / total * 100, one decimal, 0.0 when the store is empty.
    pub success_rate_percent: f64,
    pub recent: Vec<Message>,
}

#[derive(Debug)]
pub struct HealthReport {
    pub healthy: bool,
    /// "connected", or the failure reason.
    pub database: String,
    pub response_time_ms: f64,
}

#[async_trait]
pub trait CampaignService: Send + Sync {
    /// Ingests the uploaded CSV, renders the template per contact, and
    /// dispatches one message per valid contact with bounded concurrency.
    ///
    /// Returns once every contact has a terminal message. Returns `Err`
    /// only for request-level problems (empty template, unusable CSV,
    /// unreachable store); gateway and rendering failures are recorded
    /// per-message and reflected in the report counts.
    async fn run_campaign(
        &self,
        template: &str,
        csv_data: &[u8],
    ) -> Result<CampaignReport, CampaignError>;

    /// Global per-status counts and the most recent messages, newest
    /// first. Read-only; safe to poll while a dispatch is in flight.
    async fn metrics_summary(&self) -> Result<MetricsReport, CampaignError>;

    /// Measures a store round-trip. Healthy iff it succeeds within the
    /// probe timeout. Read-only.
    async fn health(&self) -> HealthReport;
}
